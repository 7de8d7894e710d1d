//! Producers behind the human checkpoints.

use async_trait::async_trait;
use scribe_core::{NewTitle, PlanSection, Project, SearchIntent, Title};

use crate::stage::StageError;

#[async_trait]
pub trait TitleGenerator: Send + Sync {
    async fn generate(&self, project: &Project) -> Result<Vec<NewTitle>, StageError>;
}

#[async_trait]
pub trait PlanGenerator: Send + Sync {
    /// Sections in reading order; orders are assigned when the plan is built.
    async fn generate(&self, project: &Project, title: &Title) -> Result<Vec<PlanSection>, StageError>;
}

/// Five title angles derived from the topic and audience.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateTitleGenerator;

#[async_trait]
impl TitleGenerator for TemplateTitleGenerator {
    async fn generate(&self, project: &Project) -> Result<Vec<NewTitle>, StageError> {
        let topic = project.topic.trim();
        let audience = project.target_audience.trim();

        let candidates = [
            (
                format!("The Ultimate Guide to {}", topic),
                "A comprehensive overview covering all essential aspects.",
                SearchIntent::Informational,
                6,
            ),
            (
                format!("How to Master {}", topic),
                "Step-by-step guide for achieving expertise.",
                SearchIntent::Informational,
                5,
            ),
            (
                format!("{}: What Experts Don't Tell You", topic),
                "Insider knowledge and hidden strategies revealed.",
                SearchIntent::Informational,
                7,
            ),
            (
                format!("10 Essential {} Tips for {}", topic, audience),
                "Targeted advice for your specific audience.",
                SearchIntent::Informational,
                4,
            ),
            (
                format!("Why {} Matters More Than Ever", topic),
                "Exploring the growing importance and impact.",
                SearchIntent::Commercial,
                5,
            ),
        ];

        Ok(candidates
            .into_iter()
            .map(|(title, description, search_intent, difficulty)| NewTitle {
                title,
                description: description.to_string(),
                search_intent,
                difficulty,
            })
            .collect())
    }
}

/// Six-section outline scaled to the project's target word count.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplatePlanGenerator;

const OUTLINE: [(&str, u32, [&str; 2]); 6] = [
    ("Introduction", 200, ["Hook the reader", "Preview main points"]),
    ("Understanding {topic}", 400, ["Core concepts", "Key terminology"]),
    ("Key Benefits and Advantages", 350, ["Main benefits", "Real-world applications"]),
    ("Best Practices", 400, ["Industry standards", "Expert recommendations"]),
    ("Common Challenges and Solutions", 300, ["Typical obstacles", "Proven solutions"]),
    ("Conclusion", 150, ["Summary", "Call to action"]),
];

#[async_trait]
impl PlanGenerator for TemplatePlanGenerator {
    async fn generate(&self, project: &Project, _title: &Title) -> Result<Vec<PlanSection>, StageError> {
        let base: u32 = OUTLINE.iter().map(|(_, words, _)| words).sum();
        let target = project.target_word_count().max(base);

        Ok(OUTLINE
            .iter()
            .enumerate()
            .map(|(index, (heading, words, points))| {
                let scaled = (*words as u64 * target as u64 / base as u64) as u32;
                let mut section = PlanSection::new(
                    heading.replace("{topic}", project.topic.trim()),
                    scaled.clamp(50, 5000),
                )
                .with_key_points(points.iter().map(|p| p.to_string()).collect());
                section.order = index as u32;
                section
            })
            .collect())
    }
}
