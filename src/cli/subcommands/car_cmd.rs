// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use cid::Cid;
use clap::Subcommand;
use futures::{StreamExt, TryStreamExt};
use itertools::Itertools;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tracing::info;

use crate::config::CarConfig;
use crate::dag::{CarDag, write_car_with_config, write_selective_car_with_config};
use crate::db::MemoryDB;
use crate::ipld::Selector;
use crate::utils::db::car_stream::{CarHeader, CarStream};
use crate::utils::db::car_util::{dedup_block_stream, load_car_with_config, merge_car_streams};

#[derive(Debug, Subcommand)]
pub enum CarCommands {
    /// Print the header and block statistics of a CAR file
    Inspect {
        car_file: PathBuf,
        /// Hash every block and check it against its CID
        #[arg(long)]
        verify: bool,
    },
    /// Merge CAR files, keeping the first copy of every block
    Concat {
        /// A list of CAR file paths
        car_files: Vec<PathBuf>,
        /// The output CAR file path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Re-export the DAGs of a CAR file, optionally restricted by a selector
    Extract {
        car_file: PathBuf,
        /// The output CAR file path
        #[arg(short, long)]
        output: PathBuf,
        /// Roots to export. Defaults to the roots of the input file
        #[arg(long = "root")]
        roots: Vec<Cid>,
        /// Selector applied to every root, as DAG-JSON
        #[arg(long)]
        selector: Option<String>,
    },
}

impl CarCommands {
    pub async fn run(self, config: &CarConfig) -> anyhow::Result<()> {
        match self {
            Self::Inspect { car_file, verify } => {
                let config = CarConfig {
                    verify_cids: config.verify_cids || verify,
                    ..config.clone()
                };
                inspect(&car_file, &config, &mut std::io::stdout()).await
            }
            Self::Concat { car_files, output } => {
                let mut writer = create(&output).await?;
                concat(&car_files, config, &mut writer).await?;
                writer.flush().await?;
                Ok(())
            }
            Self::Extract {
                car_file,
                output,
                roots,
                selector,
            } => {
                let selector = selector
                    .as_deref()
                    .map(serde_json::from_str::<Selector>)
                    .transpose()
                    .context("invalid selector")?;
                let mut writer = create(&output).await?;
                extract(&car_file, roots, selector, config, &mut writer).await?;
                writer.flush().await?;
                Ok(())
            }
        }
    }
}

async fn open(path: &Path, config: &CarConfig) -> anyhow::Result<CarStream<BufReader<tokio::fs::File>>> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    Ok(CarStream::with_config(BufReader::new(file), config).await?)
}

async fn create(path: &Path) -> anyhow::Result<BufWriter<tokio::fs::File>> {
    let file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

async fn inspect(car_file: &Path, config: &CarConfig, out: &mut impl Write) -> anyhow::Result<()> {
    let stream = open(car_file, config).await?;
    let header = stream.header.clone();
    let (blocks, bytes) = stream
        .try_fold((0usize, 0usize), |(blocks, bytes), block| {
            futures::future::ready(Ok((blocks + 1, bytes + block.data.len())))
        })
        .await?;

    writeln!(out, "Version: {}", header.version)?;
    writeln!(out, "Roots: {}", header.roots.len())?;
    for root in &header.roots {
        writeln!(out, "  {root}")?;
    }
    writeln!(out, "Blocks: {blocks}")?;
    writeln!(out, "Payload bytes: {bytes}")?;
    Ok(())
}

async fn concat(
    car_files: &[PathBuf],
    config: &CarConfig,
    writer: impl AsyncWrite + Unpin,
) -> anyhow::Result<()> {
    let car_streams: Vec<_> = futures::stream::iter(car_files)
        .then(|path| open(path, config))
        .try_collect()
        .await?;

    let all_roots = car_streams
        .iter()
        .flat_map(|it| it.header.roots.iter())
        .unique()
        .cloned()
        .collect::<Vec<_>>();

    CarHeader::new(all_roots)
        .write_stream_async(writer, dedup_block_stream(merge_car_streams(car_streams)))
        .await?;
    info!("merged {} CAR files", car_files.len());
    Ok(())
}

async fn extract(
    car_file: &Path,
    roots: Vec<Cid>,
    selector: Option<Selector>,
    config: &CarConfig,
    writer: impl AsyncWrite + Unpin,
) -> anyhow::Result<usize> {
    let db = MemoryDB::default();
    let file = tokio::fs::File::open(car_file)
        .await
        .with_context(|| format!("failed to open {}", car_file.display()))?;
    let header = load_car_with_config(&db, BufReader::new(file), config).await?;
    let roots = if roots.is_empty() { header.roots } else { roots };

    let n_blocks = match selector {
        Some(selector) => {
            let dags = roots
                .into_iter()
                .map(|root| CarDag::new(root, selector.clone()))
                .collect();
            write_selective_car_with_config(&db, dags, writer, config).await?
        }
        None => write_car_with_config(&db, roots, writer, config).await?,
    };
    info!(
        "extracted {n_blocks} of {} blocks from {}",
        db.len(),
        car_file.display()
    );
    Ok(n_blocks)
}
