use rand::Rng;
use typed_builder::TypedBuilder;

use crate::error::BenchError;

/// Placeholder replaced by the query parameter when a template is rendered.
pub const SLOT: &str = "{param}";

/// A query string with exactly one parameter slot.
///
/// The template is split around the slot once at construction, so rendering is a
/// single allocation and never re-scans the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    head: String,
    tail: String,
}

impl QueryTemplate {
    pub fn new(text: &str) -> Result<Self, BenchError> {
        let found = text.matches(SLOT).count();
        if found != 1 {
            return Err(BenchError::TemplateSlot { slot: SLOT, found });
        }
        let (head, tail) = text
            .split_once(SLOT)
            .ok_or(BenchError::TemplateSlot { slot: SLOT, found })?;
        Ok(Self {
            head: head.to_string(),
            tail: tail.to_string(),
        })
    }

    pub fn render(&self, param: &str) -> String {
        let mut out = String::with_capacity(self.head.len() + param.len() + self.tail.len());
        out.push_str(&self.head);
        out.push_str(param);
        out.push_str(&self.tail);
        out
    }
}

/// One template per target table, built at startup and shared read-only by
/// every worker.
#[derive(Debug, Clone)]
pub struct QueryTemplateSet {
    templates: Vec<QueryTemplate>,
}

impl QueryTemplateSet {
    pub fn new(templates: Vec<QueryTemplate>) -> Result<Self, BenchError> {
        if templates.is_empty() {
            return Err(BenchError::NoTemplates);
        }
        Ok(Self { templates })
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&QueryTemplate> {
        self.templates.get(idx)
    }

    /// Pick a template uniformly at random.
    pub fn pick<'a>(&'a self, rng: &mut impl Rng) -> &'a QueryTemplate {
        &self.templates[rng.gen_range(0..self.templates.len())]
    }
}

/// Split a comma separated table list (`"1, 2,,3"`) into table names.
///
/// Blank entries are skipped; every id maps to `vectors_copy_<id>`.
pub fn table_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| format!("vectors_copy_{id}"))
        .collect()
}

/// SQL flavour of the generated vector query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// T-SQL `vector_search` table function over a DiskANN index, column `emb`.
    #[default]
    SqlServer,
    /// MySQL/TiDB `VEC_COSINE_DISTANCE` ordering, column `embedding`.
    TiDb,
}

/// Options for the vector similarity query issued against each table.
///
/// `top_k` is how many rows are returned to the client, `scan_depth` how many
/// candidates the index scans (`top_n`) before ranking. TiDB has no scan depth
/// knob, so `scan_depth` only applies to [`Dialect::SqlServer`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct VectorSearch {
    #[builder(default = 768)]
    pub dimension: usize,
    #[builder(default = 10)]
    pub top_k: usize,
    #[builder(default = 50)]
    pub scan_depth: usize,
    #[builder(default)]
    pub dialect: Dialect,
}

impl VectorSearch {
    pub fn template(&self, table: &str) -> Result<QueryTemplate, BenchError> {
        let top_k = self.top_k;
        let text = match self.dialect {
            Dialect::SqlServer => {
                let dim = self.dimension;
                format!(
                    "DECLARE @v vector({dim}) = CAST('{SLOT}' AS vector({dim}));
SELECT TOP({top_k}) t.id
FROM vector_search(
	table = [benchmark].[{table}] as t,
	column = [emb],
	similar_to = @v,
	metric = 'cosine',
	top_n = {scan_depth}
) as s",
                    scan_depth = self.scan_depth,
                )
            }
            Dialect::TiDb => format!(
                "SELECT id FROM `{table}` ORDER BY VEC_COSINE_DISTANCE(embedding, '{SLOT}') LIMIT {top_k}"
            ),
        };
        QueryTemplate::new(&text)
    }

    pub fn templates<S: AsRef<str>>(&self, tables: &[S]) -> Result<QueryTemplateSet, BenchError> {
        let templates = tables
            .iter()
            .map(|t| self.template(t.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        QueryTemplateSet::new(templates)
    }
}
