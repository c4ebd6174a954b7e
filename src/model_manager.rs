use candle_core::{DType, Device, Tensor};
use pylate_rs::ColBERT;

use crate::{
    config_db::ConfigDb,
    embedding::{DEFAULT_HASHING_DIMENSION, Embedder, HashingEmbedder, ViewMatrix},
    error::{Error, Result},
};

pub const DEFAULT_MODEL_ID: &str = "lightonai/GTE-ModernColBERT-v1";
pub const EMBEDDER_ENV_VAR: &str = "CLAUSESEEK_EMBEDDER";
pub const MODEL_ENV_VAR: &str = "CLAUSESEEK_MODEL";

/// Settings keys under which `model set` persists its choices.
pub const EMBEDDER_SETTING: &str = "embedder";
pub const MODEL_SETTING: &str = "model";
pub const DIMENSION_SETTING: &str = "dimension";

/// Select the best available compute device.
///
/// Uses CUDA when compiled with the `cuda` feature, Metal when compiled with
/// the `metal` feature, and falls back to CPU otherwise.
fn default_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            return device;
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            return device;
        }
    }

    Device::Cpu
}

/// Which embedding provider to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EmbedderKind {
    /// Pooled ColBERT token embeddings.
    Colbert,
    /// Model-free feature hashing.
    Hashing,
}

impl EmbedderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Colbert => "colbert",
            Self::Hashing => "hashing",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "colbert" => Ok(Self::Colbert),
            "hashing" => Ok(Self::Hashing),
            other => Err(Error::Config(format!(
                "unknown embedder '{other}' (expected colbert or hashing)"
            ))),
        }
    }
}

/// Partially specified embedder settings from one configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedderOverrides {
    pub kind: Option<EmbedderKind>,
    pub model: Option<String>,
    pub dimension: Option<usize>,
}

impl EmbedderOverrides {
    /// Read `CLAUSESEEK_EMBEDDER` and `CLAUSESEEK_MODEL`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let kind = lookup(EMBEDDER_ENV_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(|v| EmbedderKind::parse(&v))
            .transpose()?;
        let model = lookup(MODEL_ENV_VAR).filter(|v| !v.trim().is_empty());
        Ok(Self {
            kind,
            model,
            dimension: None,
        })
    }

    /// Read the choices persisted by `model set`.
    pub fn from_settings(config_db: &ConfigDb) -> Result<Self> {
        let kind = config_db
            .get_setting(EMBEDDER_SETTING)?
            .map(|v| EmbedderKind::parse(&v))
            .transpose()?;
        let model = config_db.get_setting(MODEL_SETTING)?;
        let dimension = config_db
            .get_setting(DIMENSION_SETTING)?
            .map(|v| {
                v.trim().parse::<usize>().map_err(|e| {
                    Error::Config(format!("invalid stored dimension '{v}': {e}"))
                })
            })
            .transpose()?;
        Ok(Self {
            kind,
            model,
            dimension,
        })
    }

    /// Persist every set field as a setting.
    pub fn store(&self, config_db: &ConfigDb) -> Result<()> {
        if let Some(kind) = self.kind {
            config_db.set_setting(EMBEDDER_SETTING, kind.as_str())?;
        }
        if let Some(model) = &self.model {
            config_db.set_setting(MODEL_SETTING, model)?;
        }
        if let Some(dimension) = self.dimension {
            config_db.set_setting(DIMENSION_SETTING, &dimension.to_string())?;
        }
        Ok(())
    }

    /// Fill unset fields from `lower`.
    fn or(self, lower: Self) -> Self {
        Self {
            kind: self.kind.or(lower.kind),
            model: self.model.or(lower.model),
            dimension: self.dimension.or(lower.dimension),
        }
    }
}

/// Fully resolved embedder settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedderConfig {
    pub kind: EmbedderKind,
    pub model: String,
    pub dimension: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            kind: EmbedderKind::Colbert,
            model: DEFAULT_MODEL_ID.to_string(),
            dimension: DEFAULT_HASHING_DIMENSION,
        }
    }
}

impl EmbedderConfig {
    /// Layer flags over environment over stored settings over defaults.
    pub fn resolve(
        flags: EmbedderOverrides,
        env: EmbedderOverrides,
        stored: EmbedderOverrides,
    ) -> Result<Self> {
        let merged = flags.or(env).or(stored);
        let defaults = Self::default();

        let dimension = merged.dimension.unwrap_or(defaults.dimension);
        if dimension == 0 {
            return Err(Error::Config(
                "embedding dimension must be positive".to_string(),
            ));
        }

        Ok(Self {
            kind: merged.kind.unwrap_or(defaults.kind),
            model: merged.model.unwrap_or(defaults.model),
            dimension,
        })
    }

    /// Resolve against the process environment and the settings in
    /// `config_db`.
    pub fn load(flags: EmbedderOverrides, config_db: &ConfigDb) -> Result<Self> {
        Self::resolve(
            flags,
            EmbedderOverrides::from_env()?,
            EmbedderOverrides::from_settings(config_db)?,
        )
    }

    /// A one-line description for `status` and `model show`.
    pub fn describe(&self) -> String {
        match self.kind {
            EmbedderKind::Colbert => format!("colbert ({})", self.model),
            EmbedderKind::Hashing => format!("hashing ({} dims)", self.dimension),
        }
    }
}

/// Bring up the configured embedder.
///
/// ColBERT weights are loaded (and downloaded if needed) here, so a missing
/// model fails before any request is served.
pub fn load_embedder(config: &EmbedderConfig) -> Result<Box<dyn Embedder>> {
    match config.kind {
        EmbedderKind::Hashing => {
            Ok(Box::new(HashingEmbedder::new(config.dimension)))
        }
        EmbedderKind::Colbert => {
            Ok(Box::new(ColbertEmbedder::load(config.model.clone())?))
        }
    }
}

/// Sentence-level embeddings from a ColBERT model.
///
/// Token embeddings are summed over the sequence and L2-normalised, giving
/// one vector per text.
pub struct ColbertEmbedder {
    model: ColBERT,
    model_id: String,
    dimension: usize,
}

impl ColbertEmbedder {
    pub fn load(model_id: String) -> Result<Self> {
        tracing::info!(model = %model_id, "loading ColBERT model");

        let device = default_device();
        let model: ColBERT = ColBERT::from(&model_id)
            .with_device(device)
            .try_into()
            .map_err(|e| {
                Error::Capability(format!("failed to load {model_id}: {e}"))
            })?;

        let mut embedder = Self {
            model,
            model_id,
            dimension: 0,
        };
        let probe = embedder.encode_pooled(&["probe".to_string()])?;
        embedder.dimension = probe.dims2()?.1;

        tracing::debug!(dimension = embedder.dimension, "model ready");
        Ok(embedder)
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Encode texts and pool to `[batch, dim]` on the CPU.
    fn encode_pooled(&mut self, texts: &[String]) -> Result<Tensor> {
        let tokens = self
            .model
            .encode(texts, false)
            .map_err(|e| Error::Capability(format!("encoding failed: {e}")))?;

        let pooled = tokens
            .to_device(&Device::Cpu)?
            .to_dtype(DType::F32)?
            .sum(1)?;
        let norms = pooled.sqr()?.sum_keepdim(1)?.sqrt()?.maximum(1e-12f32)?;
        Ok(pooled.broadcast_div(&norms)?)
    }
}

impl Embedder for ColbertEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn fingerprint(&self) -> String {
        format!("colbert:{}:{}", self.model_id, self.dimension)
    }

    fn embed(&mut self, texts: &[String]) -> Result<ViewMatrix> {
        let pooled = self.encode_pooled(texts)?;
        let (rows, dimension) = pooled.dims2()?;
        let data = pooled.flatten_all()?.to_vec1::<f32>()?;
        ViewMatrix::new(rows, dimension, data)
    }
}
