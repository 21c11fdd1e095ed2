// src/core/prompts.rs — Prompt templates for SQL and insight generation

use minijinja::{context, Environment};
use serde_json::{Map, Value};

use crate::infra::errors::SqlBuddyError;

const SQL_TEMPLATE: &str = "You are a SQL expert. Based on the following database schema and conversation context, generate a SQL query to answer the user's question.

Database Schema:
{% if schema %}{{ schema }}{% else %}No matching tables were found.{% endif %}

Conversation Context:
{{ memory }}

User Question: {{ question }}

Important rules:
1. Generate ONLY the SQL query without any explanation, markdown formatting, or code blocks
2. The query should be syntactically correct SQLite SQL
3. Use the conversation context to resolve follow-up questions such as \"those customers\" or \"the same period\"
4. Return just the raw SQL query text

SQL Query:";

const INSIGHTS_TEMPLATE: &str = "You are a data analyst for a retail business.

User Question: {{ question }}
SQL Query: {{ sql }}

{% if row_count == 0 %}The query returned no results. State that clearly and suggest what the user could ask instead.
{% else %}The query returned {{ row_count }} row(s){% if shown < row_count %}; the first {{ shown }} are shown{% endif %}:
{{ rows }}
{% endif %}
Provide a short, actionable summary and insights.";

pub struct PromptBuilder {
    env: Environment<'static>,
    insight_row_limit: usize,
}

impl PromptBuilder {
    pub fn new(insight_row_limit: usize) -> Result<Self, SqlBuddyError> {
        let mut env = Environment::new();
        env.add_template("sql", SQL_TEMPLATE)?;
        env.add_template("insights", INSIGHTS_TEMPLATE)?;
        Ok(Self {
            env,
            insight_row_limit,
        })
    }

    /// Prompt for `GENERATE_SQL`: schema section, combined memory context,
    /// then the question.
    pub fn sql_prompt(
        &self,
        schema: &str,
        memory: &str,
        question: &str,
    ) -> Result<String, SqlBuddyError> {
        let tmpl = self.env.get_template("sql")?;
        Ok(tmpl.render(context! { schema, memory, question })?)
    }

    /// Prompt for `GENERATE_INSIGHTS`. At most `insight_row_limit` rows are
    /// serialized; `row_count` always reflects the full result.
    pub fn insights_prompt(
        &self,
        question: &str,
        sql: &str,
        records: &[Map<String, Value>],
    ) -> Result<String, SqlBuddyError> {
        let shown = records.len().min(self.insight_row_limit);
        let rows = serde_json::to_string_pretty(&records[..shown])?;
        let tmpl = self.env.get_template("insights")?;
        Ok(tmpl.render(context! {
            question,
            sql,
            rows,
            shown,
            row_count => records.len(),
        })?)
    }
}
