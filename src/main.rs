use anyhow::Context;
use clap::{Parser, Subcommand};
use cluster_indexer::cluster::client::ClusterClient;
use cluster_indexer::cluster::handlers::router;
use cluster_indexer::cluster::http::HttpClusterClient;
use cluster_indexer::cluster::memory::InMemoryCluster;
use cluster_indexer::codec::codec::DocumentCodec;
use cluster_indexer::codec::fixture::{FIXTURE_COLUMNS, FixtureLineParser};
use cluster_indexer::config::BridgeConfig;
use cluster_indexer::dataset::local::LocalDataset;
use cluster_indexer::dataset::dataset::ParallelDataset;
use cluster_indexer::pipeline::harness::{VerificationHarness, default_fixture_lines, generated_fixture_lines};
use cluster_indexer::pipeline::run::IndexingPipeline;
use cluster_indexer::query::reader::QueryReader;
use futures::StreamExt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "cluster-node")]
#[command(about = "Index partitioned records into a sharded search cluster and read them back")]
#[command(version)]
struct Args {
    /// Maximum log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve an in-memory reference cluster over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1:8983")]
        bind: SocketAddr,

        /// Number of simulated nodes replicas are placed on
        #[arg(long, default_value_t = 2)]
        nodes: usize,

        /// Make writes visible after this many milliseconds without a commit
        #[arg(long)]
        soft_commit_ms: Option<u64>,
    },
    /// Index comma-separated fixture lines from a file
    Index {
        #[arg(long, default_value = "http://127.0.0.1:8983")]
        url: String,

        /// JSON configuration file; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        collection: Option<String>,

        /// File with one `id,field1,field2,field3_int` line per record
        #[arg(long)]
        input: PathBuf,

        /// Column names for the positional cells, comma-separated
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,
    },
    /// Stream matching documents as JSON lines
    Query {
        #[arg(long, default_value = "http://127.0.0.1:8983")]
        url: String,

        #[arg(long)]
        collection: String,

        #[arg(long, short, default_value = "*:*")]
        q: String,

        #[arg(long, default_value_t = 100)]
        page_size: usize,

        /// Print only the number of matches
        #[arg(long)]
        count: bool,
    },
    /// Create a collection, index fixture rows, wait for visibility and read back
    Verify {
        #[arg(long, default_value = "http://127.0.0.1:8983")]
        url: String,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        collection: String,

        /// Generate this many rows instead of the three default ones
        #[arg(long)]
        docs: Option<usize>,

        #[arg(long, default_value_t = 2)]
        shards: usize,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<BridgeConfig> {
    match path {
        Some(path) => BridgeConfig::from_json_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(BridgeConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    match args.command {
        Command::Serve {
            bind,
            nodes,
            soft_commit_ms,
        } => {
            let mut cluster = InMemoryCluster::new(nodes);
            if let Some(ms) = soft_commit_ms {
                cluster = cluster.with_soft_commit(Duration::from_millis(ms));
            }
            let app = router(Arc::new(cluster));

            tracing::info!("Cluster node listening on {} ({} nodes)", bind, nodes);
            tracing::info!("Press Ctrl+C to shutdown");

            let listener = tokio::net::TcpListener::bind(bind).await?;
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
        }

        Command::Index {
            url,
            config,
            collection,
            input,
            columns,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(collection) = collection {
                config.collection = collection;
            }
            config.validate()?;

            let parser = match columns {
                Some(columns) => FixtureLineParser::new(columns),
                None => FixtureLineParser::new(FIXTURE_COLUMNS),
            };
            let raw = tokio::fs::read_to_string(&input)
                .await
                .with_context(|| format!("reading {}", input.display()))?;
            let lines: Vec<String> = raw
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string)
                .collect();

            let client: Arc<dyn ClusterClient> = Arc::new(HttpClusterClient::new(url));
            let schema = parser.schema();
            let dataset = LocalDataset::parallelize(lines, config.parallelism)
                .map(move |line| parser.parse(&line));
            let pipeline = IndexingPipeline::new(client, config)
                .with_codec(Arc::new(DocumentCodec::new(schema)));

            let cancel = pipeline.cancellation();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            });

            let report = pipeline.run(dataset).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Query {
            url,
            collection,
            q,
            page_size,
            count,
        } => {
            let client: Arc<dyn ClusterClient> = Arc::new(HttpClusterClient::new(url));
            let reader = QueryReader::new(client, collection);

            if count {
                println!("{}", reader.count(&q).await?);
            } else {
                let mut documents = reader.query(&q, page_size);
                while let Some(doc) = documents.next().await {
                    println!("{}", serde_json::to_string(&doc?)?);
                }
            }
        }

        Command::Verify {
            url,
            config,
            collection,
            docs,
            shards,
        } => {
            let config = load_config(config.as_ref())?;
            let harness = VerificationHarness::new(Arc::new(HttpClusterClient::new(url)), config);
            let lines = match docs {
                Some(count) => generated_fixture_lines(&collection, count),
                None => default_fixture_lines(&collection),
            };

            let report = harness.build_collection(&collection, lines, shards).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if !report.is_consistent() {
                anyhow::bail!(
                    "expected {} documents in {} but read back {}",
                    report.run.ack.documents_accepted,
                    collection,
                    report.documents.len()
                );
            }
        }
    }

    Ok(())
}
