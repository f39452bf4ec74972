//! Framework de testes do kernel
//!
//! Suites rodam dentro do kernel (sem `std`), então cada caso devolve um
//! `TestResult` em vez de entrar em pânico.

/// Resultado de teste
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    Passed,
    Failed,
    Skipped,
}

impl TestResult {
    /// `true` vira `Passed`, `false` vira `Failed`
    #[inline]
    pub const fn check(ok: bool) -> Self {
        if ok {
            Self::Passed
        } else {
            Self::Failed
        }
    }
}

/// Um caso de teste
pub struct TestCase {
    pub name: &'static str,
    pub func: fn() -> TestResult,
}

impl TestCase {
    pub const fn new(name: &'static str, func: fn() -> TestResult) -> Self {
        Self { name, func }
    }
}

/// Contagem de uma suite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuiteSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl SuiteSummary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Executa suite de testes
pub fn run_test_suite(name: &str, tests: &[TestCase]) -> SuiteSummary {
    crate::kinfo!("=== Executando suite:");
    crate::kinfo!(name);

    let mut summary = SuiteSummary::default();

    for test in tests {
        match (test.func)() {
            TestResult::Passed => {
                crate::kok!(test.name);
                summary.passed += 1;
            }
            TestResult::Failed => {
                crate::kerror!(test.name);
                summary.failed += 1;
            }
            TestResult::Skipped => {
                crate::kwarn!(test.name);
                summary.skipped += 1;
            }
        }
    }

    crate::kinfo!("Resultados: passed=", summary.passed as u64);
    if summary.failed > 0 {
        crate::kerror!("Resultados: failed=", summary.failed as u64);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok() -> TestResult {
        TestResult::Passed
    }

    fn broken() -> TestResult {
        TestResult::check(1 + 1 == 3)
    }

    fn unsupported() -> TestResult {
        TestResult::Skipped
    }

    #[test]
    fn suite_counts_each_outcome() {
        let cases = [
            TestCase::new("ok", ok),
            TestCase::new("ok again", ok),
            TestCase::new("broken", broken),
            TestCase::new("unsupported", unsupported),
        ];
        let summary = run_test_suite("framework", &cases);
        assert_eq!(
            summary,
            SuiteSummary {
                passed: 2,
                failed: 1,
                skipped: 1
            }
        );
        assert!(!summary.all_passed());
    }

    #[test]
    fn empty_suite_passes() {
        assert!(run_test_suite("vazia", &[]).all_passed());
    }
}
