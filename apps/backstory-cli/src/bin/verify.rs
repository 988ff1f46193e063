use std::{env, path::PathBuf};

use anyhow::bail;
use backstory_cli::{flag_value, init_tracing, load_settings};
use backstory_core::config::{expand_path, RetrievalStrategy};
use backstory_embed::get_default_embedder;
use backstory_judge::LlmJudge;
use backstory_verify::batch_io::{read_rows, write_predictions};
use backstory_verify::{EvidenceRetriever, StoreCatalog, Verifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let settings = load_settings()?;
    let args: Vec<String> = env::args().skip(1).collect();
    let mut input = None;
    let mut output = None;
    let mut strategy = settings.retrieval.strategy;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--strategy" => {
                strategy = match flag_value(&args, &mut i).to_lowercase().as_str() {
                    "story" => RetrievalStrategy::Story,
                    "facts" => RetrievalStrategy::Facts,
                    other => bail!("unknown strategy '{other}', expected story or facts"),
                }
            }
            a if !a.starts_with('-') && input.is_none() => input = Some(PathBuf::from(a)),
            a if !a.starts_with('-') => output = Some(PathBuf::from(a)),
            other => bail!("unknown flag {other}"),
        }
        i += 1;
    }
    let input = input.unwrap_or_else(|| expand_path(&settings.batch.input_csv));
    let output = output.unwrap_or_else(|| expand_path(&settings.batch.output_csv));

    let catalog = StoreCatalog::load(&settings)?;
    if catalog.loaded() == 0 {
        bail!("no vector stores found under {}; run backstory-indexer first", settings.data.store_root);
    }
    let retriever = EvidenceRetriever::new(get_default_embedder(&settings.embedding)?, settings.retrieval);
    let judge = LlmJudge::from_settings(&settings.judge)?;
    let verifier = Verifier::new(catalog, retriever, judge, strategy)?;

    let rows = read_rows(&input)?;
    println!("Processing {} rows from {} ({:?} strategy)", rows.len(), input.display(), strategy);
    let outcome = verifier.run_batch(rows).await;
    write_predictions(&output, &outcome.records)?;
    println!("Saved {} predictions to {} ({} rows skipped)", outcome.records.len(), output.display(), outcome.skipped.len());
    Ok(())
}
