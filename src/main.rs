use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use qburst::{
    report::{JsonReporter, StdoutReporter},
    template::table_names,
    AggregateReport, Dialect, ParameterCorpus, QueryExecutor, QueryTemplateSet, Reporter,
    RunOutcome, Runner, SimulatedExecutor, VectorSearch,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// In-process stub with a fixed latency
    Sim,
    /// MySQL-compatible server through sqlx (requires the `mysql` feature)
    Mysql,
}

impl Backend {
    /// SQL flavour the backend understands.
    fn dialect(self) -> Dialect {
        match self {
            Self::Sim => Dialect::SqlServer,
            Self::Mysql => Dialect::TiDb,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Fixed-concurrency vector search load generator")]
struct Args {
    /// Number of concurrent workers
    #[arg(short, long, default_value_t = 50)]
    concurrency: usize,

    /// Benchmark duration in seconds
    #[arg(short, long, default_value_t = 60)]
    duration: u64,

    /// Rows returned to the client (SELECT TOP)
    #[arg(long, default_value_t = 10)]
    topk: usize,

    /// Candidates scanned by the index (top_n)
    #[arg(long, default_value_t = 50)]
    top_n: usize,

    /// Comma-separated list of table numbers
    #[arg(long, default_value = "1")]
    tables: String,

    /// Path to the newline-delimited parameter file
    #[arg(long, default_value = "vectors.jsonl")]
    dataset: PathBuf,

    /// Vector dimension used in the query template
    #[arg(long, default_value_t = 768)]
    dimension: usize,

    #[arg(long, value_enum, default_value_t = Backend::Sim)]
    backend: Backend,

    /// Connection URL for the mysql backend
    #[arg(long, env = "QBURST_URL")]
    url: Option<String>,

    /// Simulated backend latency in milliseconds
    #[arg(long, default_value_t = 10)]
    sim_latency_ms: u64,

    /// Make every n-th simulated query fail
    #[arg(long)]
    sim_fail_every: Option<u64>,

    /// Characters of an error message used as its histogram key
    #[arg(long, default_value_t = 50)]
    error_key_len: usize,

    /// Progress report period in seconds
    #[arg(long, default_value_t = 5)]
    tick_secs: u64,

    /// Number of error buckets shown in the report
    #[arg(long, default_value_t = 10)]
    top_errors: usize,

    /// Print the report as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let tables = table_names(&args.tables);
    let corpus = Arc::new(ParameterCorpus::load(&args.dataset)?);
    tracing::info!("Pre-building query templates for {} tables...", tables.len());
    let templates = Arc::new(
        VectorSearch::builder()
            .dimension(args.dimension)
            .top_k(args.topk)
            .scan_depth(args.top_n)
            .dialect(args.backend.dialect())
            .build()
            .templates(&tables)?,
    );

    tracing::info!(
        "Target: {:?}, concurrency: {}, recall (top_n): {}, output (topk): {}",
        args.backend,
        args.concurrency,
        args.top_n,
        args.topk
    );

    let runner = Runner::builder()
        .workers(args.concurrency)
        .duration(Duration::from_secs(args.duration))
        .output_limit(args.topk)
        .tick(Duration::from_secs(args.tick_secs))
        .error_key_len(args.error_key_len)
        .build();

    let outcome = match args.backend {
        Backend::Sim => {
            let executor = SimulatedExecutor::builder()
                .latency(Duration::from_millis(args.sim_latency_ms))
                .rows(args.topk)
                .fail_every(args.sim_fail_every)
                .build();
            run(&runner, executor, templates, corpus).await?
        }
        Backend::Mysql => {
            let url = args.url.as_deref().ok_or("--url is required for the mysql backend")?;
            run(&runner, connect_mysql(url, args.concurrency).await?, templates, corpus).await?
        }
    };

    let report = AggregateReport::new(outcome, args.top_errors);
    if args.json {
        JsonReporter.report(&report).await
    } else {
        StdoutReporter.report(&report).await
    }
}

async fn run<Q: QueryExecutor + 'static>(
    runner: &Runner,
    executor: Q,
    templates: Arc<QueryTemplateSet>,
    corpus: Arc<ParameterCorpus>,
) -> Result<RunOutcome, Box<dyn std::error::Error>> {
    Ok(runner.run(Arc::new(executor), templates, corpus).await?)
}

#[cfg(feature = "mysql")]
async fn connect_mysql(
    url: &str,
    workers: usize,
) -> Result<qburst::executor::MySqlExecutor, Box<dyn std::error::Error>> {
    Ok(qburst::executor::MySqlExecutor::connect(url, workers).await?)
}

#[cfg(not(feature = "mysql"))]
async fn connect_mysql(
    _url: &str,
    _workers: usize,
) -> Result<SimulatedExecutor, Box<dyn std::error::Error>> {
    Err("qburst was built without the `mysql` feature".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mysql_backend_gets_mysql_syntax() {
        assert_eq!(Backend::Mysql.dialect(), Dialect::TiDb);
        assert_eq!(Backend::Sim.dialect(), Dialect::SqlServer);
    }

    #[test]
    fn mysql_templates_avoid_tsql() {
        let set = VectorSearch::builder()
            .dialect(Backend::Mysql.dialect())
            .build()
            .templates(&table_names("1"))
            .unwrap();
        let sql = set.get(0).unwrap().render("[1,2]");
        assert!(sql.contains("VEC_COSINE_DISTANCE"));
        assert!(!sql.contains("DECLARE"));
    }

    #[test]
    fn cli_defaults() {
        let args = Args::parse_from(["qburst"]);
        assert_eq!(args.concurrency, 50);
        assert_eq!(args.backend, Backend::Sim);
        assert_eq!(args.sim_fail_every, None);
    }
}
