//! Serializable snapshot of model parameters

use super::param::Param;
use crate::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Name and shape of one stored parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    pub shape: [usize; 2],
}

/// Flattened parameters tagged with the run that produced them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    pub run_id: String,
    pub parameters: Vec<ParameterInfo>,
    pub data: Vec<f32>,
}

impl ModelWeights {
    /// Snapshot parameters in the given order
    pub fn from_params<'a>(run_id: impl Into<String>, params: impl IntoIterator<Item = &'a Param>) -> Self {
        let mut parameters = Vec::new();
        let mut data = Vec::new();
        for p in params {
            parameters.push(ParameterInfo {
                name: p.name.clone(),
                shape: p.shape(),
            });
            data.extend(p.value.iter().copied());
        }
        Self {
            run_id: run_id.into(),
            parameters,
            data,
        }
    }

    pub fn num_values(&self) -> usize {
        self.data.len()
    }

    /// Copy stored values into `params`, requiring identical names and shapes
    pub fn restore_into<'a>(&self, params: impl IntoIterator<Item = &'a mut Param>) -> Result<()> {
        let params: Vec<&mut Param> = params.into_iter().collect();
        if params.len() != self.parameters.len() {
            return Err(Error::Configuration(format!(
                "weights hold {} parameters, model expects {}",
                self.parameters.len(),
                params.len()
            )));
        }
        let expected: usize = self.parameters.iter().map(|p| p.shape[0] * p.shape[1]).sum();
        if expected != self.data.len() {
            return Err(Error::CorruptArtifact(format!(
                "weights declare {expected} values but store {}",
                self.data.len()
            )));
        }

        let mut offset = 0;
        for (info, param) in self.parameters.iter().zip(params) {
            if info.name != param.name || info.shape != param.shape() {
                return Err(Error::Configuration(format!(
                    "parameter mismatch: stored {} {:?}, model {} {:?}",
                    info.name,
                    info.shape,
                    param.name,
                    param.shape()
                )));
            }
            let n = info.shape[0] * info.shape[1];
            let values = Array2::from_shape_vec(
                (info.shape[0], info.shape[1]),
                self.data[offset..offset + n].to_vec(),
            )
            .map_err(|e| Error::CorruptArtifact(format!("{}: {e}", info.name)))?;
            param.value.assign(&values);
            param.zero_grad();
            offset += n;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_snapshot_and_restore() {
        let a = Param::new("a", array![[1.0f32, 2.0], [3.0, 4.0]]);
        let b = Param::new("b", array![[5.0f32]]);
        let weights = ModelWeights::from_params("run-1", [&a, &b]);
        assert_eq!(weights.num_values(), 5);

        let mut a2 = Param::zeros("a", 2, 2);
        let mut b2 = Param::zeros("b", 1, 1);
        weights.restore_into([&mut a2, &mut b2]).unwrap();
        assert_eq!(a2.value, a.value);
        assert_eq!(b2.value, b.value);
    }

    #[test]
    fn test_shape_mismatch_is_configuration_error() {
        let a = Param::new("a", array![[1.0f32, 2.0]]);
        let weights = ModelWeights::from_params("run-1", [&a]);
        let mut wrong = Param::zeros("a", 2, 1);
        assert!(matches!(weights.restore_into([&mut wrong]), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_truncated_data_is_corrupt() {
        let a = Param::new("a", array![[1.0f32, 2.0]]);
        let mut weights = ModelWeights::from_params("run-1", [&a]);
        weights.data.pop();
        let mut target = Param::zeros("a", 1, 2);
        assert!(matches!(weights.restore_into([&mut target]), Err(Error::CorruptArtifact(_))));
    }
}
