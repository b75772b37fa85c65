//! Oracle mode: a three-button menu and a random prediction generator.

use rand::Rng;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleProblem {
    #[error("oracle menu needs exactly 3 captions, found {0}")]
    MenuSize(usize),
    #[error("oracle menu captions must be distinct ('{0}' repeats)")]
    DuplicateCaption(String),
    #[error("oracle has no prediction subjects")]
    NoSubjects,
    #[error("oracle subject '{0}' has no continuations to choose from")]
    EmptyPool(String),
}

/// One prediction opening plus the continuations reserved for it
#[derive(Debug, Clone, Deserialize)]
pub struct Subject {
    pub opening: String,
    #[serde(default)]
    pub continuations: Vec<String>,
}

/// Builds predictions as `opening + continuation`, where the continuation
/// is drawn uniformly from the general pool joined with the subject's own.
#[derive(Debug, Clone)]
pub struct PredictionGenerator {
    subjects: Vec<Subject>,
    general: Vec<String>,
}

impl PredictionGenerator {
    pub fn new(subjects: Vec<Subject>, general: Vec<String>) -> Result<Self, Vec<OracleProblem>> {
        if subjects.is_empty() {
            return Err(vec![OracleProblem::NoSubjects]);
        }
        let problems: Vec<_> = subjects
            .iter()
            .filter(|s| general.is_empty() && s.continuations.is_empty())
            .map(|s| OracleProblem::EmptyPool(s.opening.clone()))
            .collect();
        if !problems.is_empty() {
            return Err(problems);
        }
        Ok(Self { subjects, general })
    }

    pub fn predict<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let subject = &self.subjects[rng.gen_range(0..self.subjects.len())];
        let pool = self.general.len() + subject.continuations.len();
        let pick = rng.gen_range(0..pool);
        let continuation = if pick < self.general.len() {
            &self.general[pick]
        } else {
            &subject.continuations[pick - self.general.len()]
        };
        format!("{}{}", subject.opening, continuation)
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn general(&self) -> &[String] {
        &self.general
    }

    /// Number of distinct (opening, continuation) pairs
    pub fn space_size(&self) -> usize {
        self.subjects
            .iter()
            .map(|s| self.general.len() + s.continuations.len())
            .sum()
    }
}

/// Which oracle button was pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleChoice {
    Predict,
    Refuse,
    Leave,
}

/// The three oracle captions, in keyboard order
#[derive(Debug, Clone)]
pub struct OracleMenu {
    captions: [String; 3],
}

impl OracleMenu {
    pub fn new(captions: Vec<String>) -> Result<Self, OracleProblem> {
        let captions: [String; 3] = captions
            .try_into()
            .map_err(|v: Vec<String>| OracleProblem::MenuSize(v.len()))?;
        for (i, caption) in captions.iter().enumerate() {
            if captions[..i].contains(caption) {
                return Err(OracleProblem::DuplicateCaption(caption.clone()));
            }
        }
        Ok(Self { captions })
    }

    /// Exact caption lookup; anything else is not a menu tap
    pub fn choice(&self, text: &str) -> Option<OracleChoice> {
        match self.captions.iter().position(|c| c == text)? {
            0 => Some(OracleChoice::Predict),
            1 => Some(OracleChoice::Refuse),
            _ => Some(OracleChoice::Leave),
        }
    }

    pub fn caption(&self, choice: OracleChoice) -> &str {
        match choice {
            OracleChoice::Predict => &self.captions[0],
            OracleChoice::Refuse => &self.captions[1],
            OracleChoice::Leave => &self.captions[2],
        }
    }

    /// One caption per keyboard row
    pub fn keyboard(&self) -> Vec<Vec<String>> {
        self.captions.iter().map(|c| vec![c.clone()]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn subject(opening: &str, continuations: &[&str]) -> Subject {
        Subject {
            opening: opening.to_string(),
            continuations: continuations.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn generator() -> PredictionGenerator {
        PredictionGenerator::new(
            vec![
                subject("You ", &["will sing."]),
                subject("Your cat ", &["will purr.", "will leave."]),
            ],
            vec!["will be fine.".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_predictions_stay_in_declared_space() {
        let generator = generator();
        let mut allowed = HashSet::new();
        for s in generator.subjects() {
            for c in generator.general().iter().chain(&s.continuations) {
                allowed.insert(format!("{}{}", s.opening, c));
            }
        }
        assert_eq!(allowed.len(), generator.space_size());

        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let prediction = generator.predict(&mut rng);
            assert!(allowed.contains(&prediction), "unexpected {prediction}");
            seen.insert(prediction);
        }
        // Subject-specific continuations never cross subjects
        assert!(!seen.contains("You will purr."));
        assert_eq!(seen.len(), allowed.len());
    }

    #[test]
    fn test_generator_rejects_empty_pools() {
        assert_eq!(
            PredictionGenerator::new(vec![], vec!["x".to_string()]).unwrap_err(),
            vec![OracleProblem::NoSubjects]
        );
        assert_eq!(
            PredictionGenerator::new(vec![subject("Lonely ", &[])], vec![]).unwrap_err(),
            vec![OracleProblem::EmptyPool("Lonely ".to_string())]
        );
        // Subject with no own pool is fine when the general pool has entries
        assert!(PredictionGenerator::new(vec![subject("A ", &[])], vec!["b".to_string()]).is_ok());
    }

    #[test]
    fn test_menu_choice() {
        let menu = OracleMenu::new(vec!["More".into(), "Plague?".into(), "Bye".into()]).unwrap();
        assert_eq!(menu.choice("More"), Some(OracleChoice::Predict));
        assert_eq!(menu.choice("Plague?"), Some(OracleChoice::Refuse));
        assert_eq!(menu.choice("Bye"), Some(OracleChoice::Leave));
        assert_eq!(menu.choice("more"), None);
        assert_eq!(menu.choice("tell me"), None);
        assert_eq!(menu.caption(OracleChoice::Leave), "Bye");
        assert_eq!(menu.keyboard().len(), 3);
    }

    #[test]
    fn test_menu_validation() {
        assert_eq!(
            OracleMenu::new(vec!["a".into(), "b".into()]).unwrap_err(),
            OracleProblem::MenuSize(2)
        );
        assert_eq!(
            OracleMenu::new(vec!["a".into(), "b".into(), "a".into()]).unwrap_err(),
            OracleProblem::DuplicateCaption("a".to_string())
        );
    }
}
