use std::{fmt, str::FromStr};

use machine_learning::arch::{Sequential, activations::ActFn, layers::Dense};
use serde::Deserialize;

use crate::{cifar::IMAGE_SIZE, error::OrchestratorError};

/// The encoder architectures a pretrained checkpoint can be loaded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Backbone {
    /// Two relu layers, 3072 → 512 → 256.
    Mlp256,
    /// Two relu layers, 3072 → 1024 → 512.
    Mlp512,
}

impl Backbone {
    pub const ALL: [Backbone; 2] = [Backbone::Mlp256, Backbone::Mlp512];

    pub fn name(self) -> &'static str {
        match self {
            Backbone::Mlp256 => "mlp256",
            Backbone::Mlp512 => "mlp512",
        }
    }

    fn hidden_dim(self) -> usize {
        match self {
            Backbone::Mlp256 => 512,
            Backbone::Mlp512 => 1024,
        }
    }

    /// The width of the representation the encoder outputs.
    pub fn feature_dim(self) -> usize {
        match self {
            Backbone::Mlp256 => 256,
            Backbone::Mlp512 => 512,
        }
    }

    /// Builds the encoder, which takes flattened CIFAR images.
    pub fn encoder(self) -> Sequential {
        Sequential::new([
            Dense::new((IMAGE_SIZE, self.hidden_dim()), Some(ActFn::relu())),
            Dense::new((self.hidden_dim(), self.feature_dim()), Some(ActFn::relu())),
        ])
    }

    /// Builds the projection head the encoder was pretrained with.
    pub fn projector(self, projection_dim: usize) -> Sequential {
        let feature_dim = self.feature_dim();
        Sequential::new([
            Dense::new((feature_dim, feature_dim), Some(ActFn::relu())),
            Dense::new((feature_dim, projection_dim), None),
        ])
    }
}

impl fmt::Display for Backbone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backbone {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|backbone| backbone.name() == s)
            .ok_or_else(|| OrchestratorError::UnknownBackbone {
                name: s.to_string(),
                supported: Self::ALL.iter().map(|backbone| backbone.name()).collect(),
            })
    }
}

impl TryFrom<String> for Backbone {
    type Error = OrchestratorError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
