use crate::core::Recipe;
use crate::domain::model::RunSummary;
use crate::utils::error::Result;
use std::time::Instant;

pub struct ProtocolEngine<R: Recipe> {
    recipe: R,
}

impl<R: Recipe> ProtocolEngine<R> {
    pub fn new(recipe: R) -> Self {
        Self { recipe }
    }

    pub fn recipe(&self) -> &R {
        &self.recipe
    }

    /// prepare → execute → teardown；任一階段失敗即中止，teardown 不會執行
    pub fn run(&mut self) -> Result<RunSummary> {
        let start_time = Instant::now();
        tracing::info!("🚀 Starting protocol run");

        tracing::info!("🔧 Preparing deck...");
        self.recipe.prepare()?;

        tracing::info!("🧪 Executing steps...");
        let summary = self.recipe.execute()?;
        tracing::info!(
            "✅ Executed {} steps, {} tips used, {} rack replacements",
            summary.steps_executed,
            summary.tips_used,
            summary.rack_replacements
        );

        tracing::info!("💾 Tearing down...");
        self.recipe.teardown(&summary)?;

        tracing::info!("🏁 Protocol finished in {:?}", start_time.elapsed());
        Ok(summary)
    }

    pub fn into_recipe(self) -> R {
        self.recipe
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ProtocolError;

    #[derive(Default)]
    struct PhaseRecipe {
        phases: Vec<&'static str>,
        fail_execute: bool,
    }

    impl Recipe for PhaseRecipe {
        fn prepare(&mut self) -> Result<()> {
            self.phases.push("prepare");
            Ok(())
        }

        fn execute(&mut self) -> Result<RunSummary> {
            self.phases.push("execute");
            if self.fail_execute {
                return Err(ProtocolError::HardwareFault {
                    message: "plunger jammed".to_string(),
                });
            }
            Ok(RunSummary {
                steps_executed: 2,
                ..Default::default()
            })
        }

        fn teardown(&mut self, _summary: &RunSummary) -> Result<()> {
            self.phases.push("teardown");
            Ok(())
        }
    }

    #[test]
    fn test_engine_runs_all_phases_in_order() {
        let mut engine = ProtocolEngine::new(PhaseRecipe::default());
        let summary = engine.run().unwrap();

        assert_eq!(summary.steps_executed, 2);
        assert_eq!(engine.recipe().phases, vec!["prepare", "execute", "teardown"]);
    }

    #[test]
    fn test_failed_execute_skips_teardown() {
        let mut engine = ProtocolEngine::new(PhaseRecipe {
            fail_execute: true,
            ..Default::default()
        });

        assert!(engine.run().is_err());
        assert_eq!(engine.into_recipe().phases, vec!["prepare", "execute"]);
    }
}
