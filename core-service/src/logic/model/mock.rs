//! Mock Classifier
//!
//! Deterministic stand-in for development and tests, selected with
//! `CLASSIFIER_BACKEND=mock`. Scores are a fixed function of the input's
//! channel means, so identical images always rank identically.

use chrono::{DateTime, Utc};
use ndarray::{Array4, Axis};

use crate::logic::config::CropModelConfig;
use super::inference::{softmax, ClassifierDescription, CropClassifier, ModelError};

pub struct MockClassifier {
    crop: String,
    num_classes: usize,
    loaded_at: Option<DateTime<Utc>>,
}

impl MockClassifier {
    pub fn new(config: &CropModelConfig) -> Self {
        Self {
            crop: config.key.clone(),
            num_classes: config.classes.len(),
            loaded_at: None,
        }
    }
}

/// Mean of each channel over an NHWC tensor
fn channel_means(input: &Array4<f32>) -> [f32; 3] {
    let mut means = [0.0f32; 3];
    for (channel, mean) in means.iter_mut().enumerate() {
        let lane = input.index_axis(Axis(3), channel);
        *mean = lane.mean().unwrap_or(0.0);
    }
    means
}

impl CropClassifier for MockClassifier {
    fn load(&mut self) -> Result<(), ModelError> {
        if self.num_classes == 0 {
            return Err(ModelError::InvalidConfig(format!("crop '{}' declares no classes", self.crop)));
        }
        log::info!("Using mock classifier for {} ({} classes)", self.crop, self.num_classes);
        self.loaded_at = Some(Utc::now());
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded_at.is_some()
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn forward(&mut self, input: &Array4<f32>) -> Result<Vec<f32>, ModelError> {
        if !self.is_loaded() {
            return Err(ModelError::NotLoaded(self.crop.clone()));
        }

        let [r, g, b] = channel_means(input);
        let logits: Vec<f32> = (0..self.num_classes)
            .map(|i| {
                let k = (i + 1) as f32;
                (k * 1.37 + r * 0.05).sin() * 2.0
                    + (k * 0.61 + g * 0.03).cos() * 1.5
                    + (k * 0.29 + b * 0.02).sin()
            })
            .collect();

        Ok(softmax(&logits))
    }

    fn describe(&self) -> ClassifierDescription {
        ClassifierDescription {
            model_type: "Mock".to_string(),
            model_path: None,
            loaded: self.is_loaded(),
            loaded_at: self.loaded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::config::ClassifierFamily;
    use std::collections::HashMap;

    fn config(classes: &[&str]) -> CropModelConfig {
        CropModelConfig {
            key: "potato".into(),
            name: "Potato".into(),
            model_path: String::new(),
            family: ClassifierFamily::KerasRescaling,
            classes: classes.iter().map(|c| c.to_string()).collect(),
            display_names: HashMap::new(),
            sha256: None,
            severity_thresholds: None,
        }
    }

    #[test]
    fn test_empty_classes_fail_to_load() {
        let mut mock = MockClassifier::new(&config(&[]));
        assert!(matches!(mock.load(), Err(ModelError::InvalidConfig(_))));
    }

    #[test]
    fn test_forward_before_load_is_not_loaded() {
        let mut mock = MockClassifier::new(&config(&["a", "b"]));
        let input = Array4::<f32>::zeros((1, 4, 4, 3));
        assert!(matches!(mock.forward(&input), Err(ModelError::NotLoaded(_))));
    }

    #[test]
    fn test_predict_loads_implicitly_and_is_deterministic() {
        let mut mock = MockClassifier::new(&config(&["a", "b", "c"]));
        let input = Array4::<f32>::from_elem((1, 4, 4, 3), 120.0);

        let first = mock.predict(&input, 3).unwrap();
        let second = mock.predict(&input, 3).unwrap();
        assert!(mock.is_loaded());
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn test_scores_are_probabilities() {
        let mut mock = MockClassifier::new(&config(&["a", "b", "c", "d"]));
        mock.load().unwrap();
        let scores = mock.forward(&Array4::<f32>::from_elem((1, 2, 2, 3), 33.0)).unwrap();
        assert_eq!(scores.len(), 4);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }
}
