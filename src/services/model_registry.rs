use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};
use crate::models::Market;
use crate::services::{SoftmaxModel, FEATURE_NAMES};

/// Persisted classifier for one market, stamped with the schema it was fitted on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact<M> {
    pub market: Market,
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub train_rows: usize,
    pub test_accuracy: f64,
    pub model: M,
}

/// One JSON file per market under a models directory, keyed by the market name.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    dir: PathBuf,
}

impl ModelRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, market: Market) -> PathBuf {
        self.dir.join(format!("{}.json", market.name()))
    }

    pub fn save<M: Serialize>(&self, artifact: &ModelArtifact<M>) -> EngineResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(artifact.market);
        fs::write(&path, serde_json::to_vec_pretty(artifact)?)?;
        tracing::debug!("Saved {} model to {}", artifact.market, path.display());
        Ok(path)
    }

    /// Loads a market's artifact, refusing it if it was fitted on a different schema.
    pub fn load(&self, market: Market) -> EngineResult<ModelArtifact<SoftmaxModel>> {
        let path = self.path_for(market);
        if !path.exists() {
            return Err(EngineError::ModelNotTrained {
                market: market.name().to_string(),
            });
        }

        let artifact: ModelArtifact<SoftmaxModel> = serde_json::from_slice(&fs::read(&path)?)?;
        if artifact.market != market {
            return Err(EngineError::InvalidModel(format!(
                "{} holds a {} model",
                path.display(),
                artifact.market
            )));
        }
        if artifact.feature_names != FEATURE_NAMES {
            return Err(EngineError::SchemaMismatch {
                expected: FEATURE_NAMES.len(),
                found: artifact.feature_names.len(),
            });
        }
        artifact.model.validate(FEATURE_NAMES.len(), market.n_classes())?;
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{ClassifierTrainer, SoftmaxTrainer, FEATURE_COUNT};

    fn temp_registry(name: &str) -> ModelRegistry {
        let dir = std::env::temp_dir().join(format!("goalcast-registry-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        ModelRegistry::new(dir)
    }

    fn artifact(market: Market) -> ModelArtifact<SoftmaxModel> {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64; FEATURE_COUNT]).collect();
        let labels: Vec<usize> = (0..10).map(|i| i % market.n_classes()).collect();
        let model = SoftmaxTrainer::default()
            .fit(&rows, &labels, market.n_classes())
            .unwrap();
        ModelArtifact {
            market,
            feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            trained_at: Utc::now(),
            train_rows: rows.len(),
            test_accuracy: 0.5,
            model,
        }
    }

    #[test]
    fn test_missing_model_is_not_trained() {
        let registry = temp_registry("missing");
        match registry.load(Market::Over25) {
            Err(EngineError::ModelNotTrained { market }) => assert_eq!(market, "over25"),
            other => panic!("unexpected: {:?}", other.map(|a| a.market)),
        }
    }

    #[test]
    fn test_save_then_load() {
        let registry = temp_registry("roundtrip");
        let path = registry.save(&artifact(Market::Result)).unwrap();
        assert!(path.ends_with("result.json"));

        let loaded = registry.load(Market::Result).unwrap();
        assert_eq!(loaded.market, Market::Result);
        assert_eq!(loaded.train_rows, 10);
        let _ = fs::remove_dir_all(registry.dir());
    }

    #[test]
    fn test_schema_drift_is_rejected() {
        let registry = temp_registry("drift");
        let mut stale = artifact(Market::Btts);
        stale.feature_names.pop();
        registry.save(&stale).unwrap();

        assert!(matches!(
            registry.load(Market::Btts),
            Err(EngineError::SchemaMismatch { .. })
        ));
        let _ = fs::remove_dir_all(registry.dir());
    }
}
