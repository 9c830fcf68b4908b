//! Planning stage
//!
//! Turns the query and clarification context into an ordered set of web searches.

use crate::research::error::ModelInvocationError;
use crate::research::model::{typed_call, ModelClient};
use crate::research::types::{ClarificationContext, ResearchQuery, SearchPlan, SearchTask};
use std::sync::Arc;

fn planner_instructions(num_searches: usize) -> String {
    format!(
        "You are a helpful research assistant. Given a query and clarifying information, \
come up with a set of web searches to perform to best answer the query.

When planning searches:
1. Consider the original query carefully
2. Take into account any clarifying information or answers provided
3. Create search terms that are specific and targeted based on the clarifications
4. Ensure searches cover different aspects of the refined query
5. Output {} search terms to query for.

The searches should be tuned to the specific needs revealed by the clarifications.",
        num_searches
    )
}

fn plan_input(query: &ResearchQuery, context: Option<&ClarificationContext>) -> String {
    match context {
        Some(context) => format!(
            "Original query: {}\n\nUser's answers to clarifying questions:\n{}\n\n\
Plan web searches that are tuned to address both the original query and the user's specific answers.",
            query,
            context.as_str()
        ),
        None => format!(
            "Original query: {}\n\nPlan web searches to answer this query.",
            query
        ),
    }
}

/// Asks the model for a search plan
#[derive(Clone)]
pub struct PlanStage {
    model: Arc<dyn ModelClient>,
    num_searches: usize,
}

impl PlanStage {
    /// Create the stage; `num_searches` is the target plan size
    pub fn new(model: Arc<dyn ModelClient>, num_searches: usize) -> Self {
        Self {
            model,
            num_searches,
        }
    }

    /// Produce the search tasks for `query`
    ///
    /// A plan longer than the target is truncated; a shorter one is kept as-is.
    ///
    /// # Errors
    /// Any model failure. A plan left with no searches after truncation is
    /// `MalformedOutput`.
    pub async fn plan(
        &self,
        query: &ResearchQuery,
        context: Option<&ClarificationContext>,
    ) -> Result<Vec<SearchTask>, ModelInvocationError> {
        let instructions = planner_instructions(self.num_searches);
        let input = plan_input(query, context);

        let plan: SearchPlan = typed_call(self.model.as_ref(), &instructions, &input).await?;
        let mut searches = plan.searches;

        if searches.len() != self.num_searches {
            tracing::warn!(
                requested = self.num_searches,
                received = searches.len(),
                "Planner returned a different number of searches than requested"
            );
        }
        searches.truncate(self.num_searches);
        if searches.is_empty() {
            return Err(ModelInvocationError::MalformedOutput(
                "Search plan contains no searches".to_string(),
            ));
        }

        tracing::info!(task_count = searches.len(), "Will perform searches");
        Ok(searches)
    }
}
