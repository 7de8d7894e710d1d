//! Offline stage implementations that derive their artifacts from the
//! project intent and the approved plan.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use scribe_core::{
    count_words, DraftContent, FaqEntry, NewResearchSource, Plan, QualityAssessment,
    QUALITY_DIMENSIONS,
};

use crate::export::markdown_to_html;
use crate::stage::{ProgressReporter, Stage, StageError, StageInput, StageOutput, StageSet};

const SEO_TITLE_CHARS: usize = 60;
const META_DESCRIPTION_CHARS: usize = 155;
const FAQ_ENTRIES: usize = 5;

impl StageSet {
    pub fn templates() -> Self {
        Self::new(
            Arc::new(TemplateResearch),
            Arc::new(TemplateWriter),
            Arc::new(TemplateEditor),
        )
    }
}

/// One source per plan section: its suggested URLs, or a search link.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateResearch;

#[async_trait]
impl Stage for TemplateResearch {
    async fn run(
        &self,
        input: &StageInput,
        progress: &ProgressReporter,
    ) -> Result<StageOutput, StageError> {
        let sections = &input.plan.sections;
        if sections.is_empty() {
            return Err(StageError::new("plan has no sections to research"));
        }

        let mut sources = Vec::new();
        for (index, section) in sections.iter().enumerate() {
            let suggested: Vec<&String> = section
                .suggested_sources
                .iter()
                .filter(|s| s.starts_with("http://") || s.starts_with("https://"))
                .collect();

            if suggested.is_empty() {
                let query = format!("{} {}", input.project.topic, section.heading);
                let mut source = NewResearchSource::new(
                    format!("https://duckduckgo.com/?q={}", query_string(&query)),
                    format!("Search: {}", section.heading),
                );
                source.extracted_facts = section.key_points.clone();
                source.section_id = Some(section.id);
                sources.push(source);
            } else {
                for url in suggested {
                    let mut source = NewResearchSource::new(url.clone(), section.heading.clone());
                    source.credibility_score = 0.7;
                    source.extracted_facts = section.key_points.clone();
                    source.section_id = Some(section.id);
                    sources.push(source);
                }
            }

            progress.report((index + 1) as f64 / sections.len() as f64);
        }

        Ok(StageOutput::Research(sources))
    }
}

fn query_string(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric() || *c == '-')
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("+")
}

/// Expands each plan section into prose built from its key points.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateWriter;

#[async_trait]
impl Stage for TemplateWriter {
    async fn run(
        &self,
        input: &StageInput,
        progress: &ProgressReporter,
    ) -> Result<StageOutput, StageError> {
        let project = &input.project;
        let sections = &input.plan.sections;
        let mut markdown = format!("# {}\n\n", input.title.trim());

        for (index, section) in sections.iter().enumerate() {
            let level = section.heading_level.clamp(2, 6) as usize;
            markdown.push_str(&format!("{} {}\n\n", "#".repeat(level), section.heading));

            if section.key_points.is_empty() {
                markdown.push_str(&format!(
                    "This section looks at {} from the point of view of {}.\n\n",
                    section.heading.to_lowercase(),
                    project.target_audience
                ));
            }
            for point in &section.key_points {
                markdown.push_str(&format!(
                    "{}. When it comes to {}, {} benefit from a clear view of this point \
                     and how it applies to their own work.\n\n",
                    point.trim_end_matches('.'),
                    project.topic,
                    project.target_audience
                ));
            }

            progress.report((index + 1) as f64 / sections.len().max(1) as f64);
        }

        if !input.sources.is_empty() {
            markdown.push_str("## Sources\n\n");
            for source in &input.sources {
                markdown.push_str(&format!("- [{}]({})\n", source.title, source.url));
            }
        }

        Ok(StageOutput::Draft(DraftContent::markdown(markdown)))
    }
}

/// Tidies the current draft, fills the SEO fields and scores it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEditor;

#[async_trait]
impl Stage for TemplateEditor {
    async fn run(
        &self,
        input: &StageInput,
        progress: &ProgressReporter,
    ) -> Result<StageOutput, StageError> {
        let draft = input
            .draft
            .as_ref()
            .ok_or_else(|| StageError::new("no current draft to edit"))?;

        let markdown = tidy(&draft.content_markdown);
        progress.report(0.5);

        let meta_description = markdown
            .split("\n\n")
            .map(str::trim)
            .find(|block| !block.is_empty() && !block.starts_with('#') && !block.starts_with("- "))
            .map(|block| truncate(block, META_DESCRIPTION_CHARS));

        let faq = faq_from_plan(&input.plan);
        let content = DraftContent {
            content_html: Some(markdown_to_html(&markdown)),
            seo_title: Some(truncate(input.title.trim(), SEO_TITLE_CHARS)),
            meta_description,
            faq_schema: (!faq.is_empty()).then_some(faq),
            content_markdown: markdown,
        };
        let assessment = assess(input, &content);
        progress.report(1.0);

        Ok(StageOutput::Edited(content, assessment))
    }
}

/// One question per section that has key points, answered by those points.
fn faq_from_plan(plan: &Plan) -> Vec<FaqEntry> {
    plan.sections
        .iter()
        .filter(|section| !section.key_points.is_empty())
        .take(FAQ_ENTRIES)
        .map(|section| {
            let heading = section.heading.trim().trim_end_matches('?');
            FaqEntry::new(
                format!("What should I know about {}?", heading.to_lowercase()),
                section.key_points.join(". "),
            )
        })
        .collect()
}

/// Trailing whitespace removed, at most one blank line between blocks.
fn tidy(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut blank_run = 0;
    for line in markdown.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string() + "\n"
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

fn assess(input: &StageInput, content: &DraftContent) -> QualityAssessment {
    let sections = input.plan.sections.len().max(1) as f64;
    let headings = content
        .content_markdown
        .lines()
        .filter(|l| l.starts_with("##"))
        .count() as f64;
    let words = count_words(&content.content_markdown) as f64;
    let target = input.project.target_word_count().max(1) as f64;
    let grounded_sections = input
        .plan
        .sections
        .iter()
        .filter(|s| input.sources.iter().any(|src| src.section_id == Some(s.id)))
        .count() as f64;

    let ratio = |value: f64| (value * 10.0).clamp(0.0, 10.0);
    let scores: BTreeMap<String, f64> = QUALITY_DIMENSIONS
        .iter()
        .map(|dimension| {
            let score = match *dimension {
                "structured" => ratio(headings.min(sections) / sections),
                "informative" => ratio(words / target),
                "grounded" | "trustworthy" => ratio(grounded_sections / sections),
                _ => 7.0,
            };
            (dimension.to_string(), score)
        })
        .collect();

    let mut assessment = QualityAssessment::from_scores(scores).with_insight(format!(
        "Covers {} planned sections for {}",
        input.plan.sections.len(),
        input.project.target_audience
    ));
    if words < target {
        assessment.suggestions.push(format!(
            "Expand the draft by about {} words to reach the target length",
            (target - words).round()
        ));
    }
    assessment
}
