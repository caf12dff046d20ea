use std::collections::BTreeMap;

use machine_learning::{Gradients, MlErr, Tensor};
use ndarray::{Axis, concatenate};

use crate::error::Result;

pub const LOSS: &str = "loss";
pub const GRADIENTS: &str = "gradients";
pub const ACCURACY: &str = "accuracy";
pub const LEARNING_RATE: &str = "learning_rate";

/// One named value a replica produces.
///
/// The variant decides how the values of every device are combined.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Averaged across devices.
    Scalar(f32),
    /// Averaged per variable across devices.
    Gradients(Gradients),
    /// Identical on every device, the first device's value is kept.
    State(f32),
    /// Concatenated along the batch axis in device order.
    Batch(Tensor),
    /// Identical on every device, the first device's value is kept.
    Meta(Vec<String>),
}

impl Output {
    fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Gradients(_) => "gradients",
            Self::State(_) => "state",
            Self::Batch(_) => "batch",
            Self::Meta(_) => "meta",
        }
    }
}

/// The outputs of one replica, keyed by name.
pub type PerDeviceResult = BTreeMap<String, Output>;

/// The outputs of one step, combined across devices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedResult {
    outputs: BTreeMap<String, Output>,
}

impl AggregatedResult {
    pub fn get(&self, name: &str) -> Option<&Output> {
        self.outputs.get(name)
    }

    /// The value of a `Scalar` or `State` output.
    pub fn scalar(&self, name: &str) -> Option<f32> {
        match self.outputs.get(name)? {
            Output::Scalar(v) | Output::State(v) => Some(*v),
            _ => None,
        }
    }

    pub fn batch(&self, name: &str) -> Option<&Tensor> {
        match self.outputs.get(name)? {
            Output::Batch(t) => Some(t),
            _ => None,
        }
    }

    pub fn meta(&self, name: &str) -> Option<&[String]> {
        match self.outputs.get(name)? {
            Output::Meta(items) => Some(items),
            _ => None,
        }
    }

    pub fn gradients(&self) -> Option<&Gradients> {
        match self.outputs.get(GRADIENTS)? {
            Output::Gradients(g) => Some(g),
            _ => None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.outputs.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Output)> {
        self.outputs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

impl FromIterator<(String, Output)> for AggregatedResult {
    fn from_iter<T: IntoIterator<Item = (String, Output)>>(iter: T) -> Self {
        Self {
            outputs: iter.into_iter().collect(),
        }
    }
}

/// Combines the outputs of every device of one step.
///
/// # Returns
/// An error if the devices don't produce the same names and kinds of outputs, or if
/// gradients or batches of one name differ in shape.
pub fn aggregate(per_device: Vec<PerDeviceResult>) -> Result<AggregatedResult> {
    let devices = per_device.len();
    let mut replicas = per_device.into_iter();
    let Some(first) = replicas.next() else {
        return Ok(AggregatedResult::default());
    };

    let rest: Vec<PerDeviceResult> = replicas.collect();
    if let Some(extra) = rest
        .iter()
        .flat_map(|replica| replica.keys())
        .find(|name| !first.contains_key(*name))
    {
        return Err(MlErr::InvalidParameter(format!(
            "output `{extra}` differs across devices"
        ))
        .into());
    }

    let mut outputs = BTreeMap::new();

    for (name, output) in first {
        let others = rest
            .iter()
            .map(|replica| match replica.get(&name) {
                Some(other) if other.kind() == output.kind() => Ok(other),
                _ => Err(MlErr::InvalidParameter(format!(
                    "output `{name}` differs across devices"
                ))),
            })
            .collect::<std::result::Result<Vec<&Output>, _>>()?;

        let combined = match output {
            Output::Scalar(v) => {
                let sum = others.iter().fold(v, |acc, o| match o {
                    Output::Scalar(x) => acc + x,
                    _ => acc,
                });
                Output::Scalar(sum / devices as f32)
            }
            Output::Gradients(mut grads) => {
                for other in others {
                    if let Output::Gradients(g) = other {
                        grads.accumulate(g)?;
                    }
                }
                grads.scale(1. / devices as f32);
                Output::Gradients(grads)
            }
            Output::Batch(t) => {
                let mut views = vec![t.view()];
                views.extend(others.iter().filter_map(|o| match o {
                    Output::Batch(t) => Some(t.view()),
                    _ => None,
                }));
                let joined = concatenate(Axis(0), &views).map_err(|_| MlErr::ShapeMismatch {
                    what: name.clone(),
                    got: views.iter().flat_map(|v| v.shape().first().copied()).collect(),
                    expected: t.shape().to_vec(),
                })?;
                Output::Batch(joined)
            }
            state @ (Output::State(_) | Output::Meta(_)) => state,
        };

        outputs.insert(name, combined);
    }

    Ok(AggregatedResult { outputs })
}

#[cfg(test)]
mod tests {
    use ndarray::IxDyn;

    use super::*;

    fn replica(loss: f32, grad: f32, lr: f32) -> PerDeviceResult {
        let mut grads = Gradients::new();
        grads.insert("w", Tensor::from_elem(IxDyn(&[2]), grad));

        BTreeMap::from([
            (LOSS.to_string(), Output::Scalar(loss)),
            (GRADIENTS.to_string(), Output::Gradients(grads)),
            (LEARNING_RATE.to_string(), Output::State(lr)),
        ])
    }

    #[test]
    fn identical_losses_average_to_themselves() {
        for devices in 1..=4 {
            let result = aggregate((0..devices).map(|_| replica(0.75, 1., 0.1)).collect()).unwrap();
            assert_eq!(result.scalar(LOSS), Some(0.75));
        }
    }

    #[test]
    fn gradients_are_averaged_not_summed() {
        let result = aggregate(vec![replica(1., 1., 0.1), replica(3., 3., 0.1)]).unwrap();

        assert_eq!(result.scalar(LOSS), Some(2.));
        let grads = result.gradients().unwrap();
        assert_eq!(grads.get("w").unwrap().as_slice().unwrap(), &[2., 2.]);
        assert_eq!(result.scalar(LEARNING_RATE), Some(0.1));
    }

    #[test]
    fn state_comes_from_the_first_device() {
        let result = aggregate(vec![replica(1., 1., 0.5), replica(1., 1., 0.7)]).unwrap();

        assert_eq!(result.scalar(LEARNING_RATE), Some(0.5));
    }

    #[test]
    fn batches_are_concatenated_in_device_order() {
        let device = |v: f32| {
            BTreeMap::from([(
                "probabilities".to_string(),
                Output::Batch(Tensor::from_elem(IxDyn(&[1, 2]), v)),
            )])
        };

        let result = aggregate(vec![device(0.), device(1.)]).unwrap();

        let probabilities = result.batch("probabilities").unwrap();
        assert_eq!(probabilities.shape(), &[2, 2]);
        assert_eq!(probabilities.as_slice().unwrap(), &[0., 0., 1., 1.]);
    }

    #[test]
    fn missing_outputs_are_an_error() {
        let mut partial = replica(1., 1., 0.1);
        partial.remove(LOSS);

        assert!(aggregate(vec![replica(1., 1., 0.1), partial]).is_err());
    }

    #[test]
    fn outputs_only_a_later_device_produces_are_an_error() {
        let mut extended = replica(1., 1., 0.1);
        extended.insert("extra".into(), Output::Scalar(1.));

        let err = aggregate(vec![replica(1., 1., 0.1), extended]).unwrap_err();

        assert!(err.to_string().contains("extra"));
    }
}
