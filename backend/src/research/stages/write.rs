//! Report synthesis stage

use crate::research::error::ModelInvocationError;
use crate::research::model::{typed_call, ModelClient};
use crate::research::types::{ClarificationContext, Report, ResearchQuery};
use std::sync::Arc;

const WRITER_INSTRUCTIONS: &str = "You are a senior researcher tasked with writing a cohesive report for a research query. \
You will be provided with the original query, any clarifying answers from the user, and some initial research done by a research assistant.
You should first come up with an outline for the report that describes the structure and flow of the report. \
Then, generate the report and return that as your final output.
The final output should be in markdown format, and it should be lengthy and detailed. Aim for 5-10 pages of content, at least 1000 words.
If no search results are available, write the best report you can from general knowledge and say so.";

const NO_RESULTS: &str = "(no search results were available)";

fn format_results(results: &[String]) -> String {
    if results.is_empty() {
        return NO_RESULTS.to_string();
    }
    results
        .iter()
        .enumerate()
        .map(|(i, summary)| format!("Result {}:\n{}", i + 1, summary))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn report_input(
    query: &ResearchQuery,
    context: Option<&ClarificationContext>,
    results: &[String],
) -> String {
    let results = format_results(results);
    match context {
        Some(context) => format!(
            "Original query: {}\n\nUser's answers to clarifying questions that refined the research:\n{}\n\n\
Summarized search results:\n{}\n\n\
Write a comprehensive report that addresses the original query while incorporating insights from the user's specific answers.",
            query,
            context.as_str(),
            results
        ),
        None => format!(
            "Original query: {}\n\nSummarized search results:\n{}\n\n\
Write a comprehensive report that addresses the query.",
            query, results
        ),
    }
}

/// Asks the model to synthesize the final report
#[derive(Clone)]
pub struct WriteStage {
    model: Arc<dyn ModelClient>,
}

impl WriteStage {
    /// Create the stage around a shared model client
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self { model }
    }

    /// Write the report; an empty `results` slice still produces one
    pub async fn write(
        &self,
        query: &ResearchQuery,
        context: Option<&ClarificationContext>,
        results: &[String],
    ) -> Result<Report, ModelInvocationError> {
        let input = report_input(query, context, results);
        let report: Report = typed_call(self.model.as_ref(), WRITER_INSTRUCTIONS, &input).await?;

        tracing::info!(
            result_count = results.len(),
            report_len = report.markdown_report.len(),
            follow_ups = report.follow_up_questions.len(),
            "Finished writing report"
        );
        Ok(report)
    }
}
