use std::io::{BufRead, Write};

use log::debug;
use rand::{thread_rng, Rng};
use rand_distr::{Distribution, Uniform};

use crate::{Error, Result};

use super::{Feature, FeatureList};

/// A dense table of feature weights, read and written through sparse [feature lists](FeatureList)
///
/// The storage type `W` decides ownership: the default `Vec<f64>` owns its weights, while a
/// borrowed `&mut [f64]` lets several functions share one externally managed buffer without ever
/// freeing it.
///
/// Every index access asserts `index < num_features`; indexing out of range is a caller error and
/// panics.
///
/// ### Example
/// ```
/// use rltrace::feature::{FeatureFunction, FeatureList};
///
/// let mut buffer = [0.0; 4];
/// let mut weights = FeatureFunction::from_weights(&mut buffer[..]);
///
/// let mut active = FeatureList::new();
/// active.set(1, 0.5);
/// active.set(3, 1.0);
/// weights.update_feature_list(&active, 2.0);
///
/// assert_eq!(weights.get_feature_list(&active), 0.5 * 1.0 + 1.0 * 2.0);
/// assert_eq!(buffer, [0.0, 1.0, 0.0, 2.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFunction<W = Vec<f64>> {
    weights: W,
}

impl FeatureFunction {
    /// Constructs an owned table of `num_features` zero weights
    pub fn new(num_features: usize) -> Self {
        Self {
            weights: vec![0.0; num_features],
        }
    }
}

impl<W> FeatureFunction<W>
where
    W: AsRef<[f64]> + AsMut<[f64]>,
{
    /// Wrap existing weight storage, owned or borrowed
    pub fn from_weights(weights: W) -> Self {
        Self { weights }
    }

    /// Give back the underlying storage
    pub fn into_weights(self) -> W {
        self.weights
    }

    pub fn num_features(&self) -> usize {
        self.weights.as_ref().len()
    }

    pub fn weights(&self) -> &[f64] {
        self.weights.as_ref()
    }

    pub fn weights_mut(&mut self) -> &mut [f64] {
        self.weights.as_mut()
    }

    pub fn get_feature(&self, index: usize) -> f64 {
        self.check(index);
        self.weights()[index]
    }

    pub fn set_feature(&mut self, index: usize, value: f64) {
        self.check(index);
        self.weights_mut()[index] = value;
    }

    pub fn update_feature(&mut self, index: usize, diff: f64) {
        self.check(index);
        self.weights_mut()[index] += diff;
    }

    /// Store `value` scaled by the feature's factor
    pub fn set_weighted_feature(&mut self, feature: &Feature, value: f64) {
        self.set_feature(feature.index, value * feature.factor);
    }

    /// Add `diff` scaled by the feature's factor
    pub fn update_weighted_feature(&mut self, feature: &Feature, diff: f64) {
        self.update_feature(feature.index, diff * feature.factor);
    }

    /// [`set_weighted_feature`](FeatureFunction::set_weighted_feature) for every entry of `features`
    pub fn set_feature_list(&mut self, features: &FeatureList, value: f64) {
        for feature in features {
            self.set_weighted_feature(feature, value);
        }
    }

    /// [`update_weighted_feature`](FeatureFunction::update_weighted_feature) for every entry of `features`
    pub fn update_feature_list(&mut self, features: &FeatureList, diff: f64) {
        for feature in features {
            self.update_weighted_feature(feature, diff);
        }
    }

    /// Weighted sum `Σ factor_i * weight_i` over the entries of `features`
    ///
    /// This is the forward pass of a linear approximator with sparse activations.
    pub fn get_feature_list(&self, features: &FeatureList) -> f64 {
        features
            .iter()
            .map(|feature| feature.factor * self.get_feature(feature.index))
            .sum()
    }

    /// Set every weight to `value`
    pub fn init(&mut self, value: f64) {
        self.weights_mut().fill(value);
    }

    /// Draw every weight uniformly from `[min, max]`
    pub fn random_init(&mut self, min: f64, max: f64) {
        assert!(min <= max, "`min` ({min}) must not exceed `max` ({max})");
        self.random_init_with(&mut thread_rng(), Uniform::new_inclusive(min, max));
    }

    /// Draw every weight from `distribution` using `rng`
    pub fn random_init_with<R, D>(&mut self, rng: &mut R, distribution: D)
    where
        R: Rng + ?Sized,
        D: Distribution<f64>,
    {
        for weight in self.weights_mut() {
            *weight = distribution.sample(rng);
        }
    }

    /// Write a `<name> (Features: <count>)` header line followed by one line of space-separated weights
    pub fn save_features<Wr: Write + ?Sized>(&self, writer: &mut Wr, name: &str) -> Result<()> {
        writeln!(writer, "{name} (Features: {})", self.num_features())?;
        for (i, weight) in self.weights().iter().enumerate() {
            if i > 0 {
                write!(writer, " ")?;
            }
            write!(writer, "{weight}")?;
        }
        writeln!(writer)?;
        debug!("Saved {} weights of `{name}`", self.num_features());
        Ok(())
    }

    /// Read weights written by [`save_features`](FeatureFunction::save_features)
    ///
    /// The stored feature count must match [`num_features`](FeatureFunction::num_features).
    ///
    /// **Returns** the name from the header
    pub fn load_features<R: BufRead + ?Sized>(&mut self, reader: &mut R) -> Result<String> {
        let mut header = String::new();
        reader.read_line(&mut header)?;
        let (name, count) = parse_header(&header)?;
        if count != self.num_features() {
            return Err(Error::DimensionMismatch {
                expected: self.num_features(),
                actual: count,
            });
        }

        let mut line = String::new();
        reader.read_line(&mut line)?;
        let values = line
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|_| Error::Parse {
                    position: header.len(),
                    message: format!("invalid weight `{token}`"),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if values.len() != count {
            return Err(Error::DimensionMismatch {
                expected: count,
                actual: values.len(),
            });
        }

        self.weights_mut().copy_from_slice(&values);
        debug!("Loaded {count} weights of `{name}`");
        Ok(name)
    }

    fn check(&self, index: usize) {
        assert!(
            index < self.num_features(),
            "Feature index {index} out of range for {} features",
            self.num_features()
        );
    }
}

/// Split `<name> (Features: <count>)` into its name and count
fn parse_header(header: &str) -> Result<(String, usize)> {
    const MARKER: &str = "(Features:";

    let header = header.trim_end();
    let start = header.rfind(MARKER).ok_or_else(|| Error::Parse {
        position: 0,
        message: format!("missing `{MARKER}` in header"),
    })?;
    let rest = &header[start + MARKER.len()..];
    let count = rest
        .strip_suffix(')')
        .and_then(|count| count.trim().parse().ok())
        .ok_or_else(|| Error::Parse {
            position: start,
            message: format!("invalid feature count in `{header}`"),
        })?;
    Ok((header[..start].trim_end().to_string(), count))
}
