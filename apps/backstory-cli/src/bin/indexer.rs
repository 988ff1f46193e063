use std::{env, path::PathBuf};

use anyhow::bail;
use backstory_cli::{flag_value, init_tracing, load_settings};
use backstory_core::config::expand_path;
use backstory_core::loader::DocumentLoader;
use backstory_core::types::SourceId;
use backstory_embed::EmbeddingPipeline;
use backstory_vector::build_source_store;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let settings = load_settings()?;
    let args: Vec<String> = env::args().skip(1).collect();
    let mut data_dir = None;
    let mut only: Option<SourceId> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--source" | "-s" => only = Some(SourceId::new(flag_value(&args, &mut i))),
            "--help" | "-h" => {
                println!("Usage: backstory-indexer [data_dir] [--source <id>]");
                return Ok(());
            }
            a if !a.starts_with('-') => data_dir = Some(PathBuf::from(a)),
            other => bail!("unknown flag {other}"),
        }
        i += 1;
    }
    let data_dir = data_dir.unwrap_or_else(|| expand_path(&settings.data.raw_txt_dir));

    let sources: Vec<_> = settings.sources.iter().filter(|s| only.as_ref().map_or(true, |id| &s.id == id)).collect();
    if sources.is_empty() {
        bail!("no configured source matches {:?}", only.map(|id| id.to_string()));
    }

    println!("Backstory store builder\n=======================");
    println!("Data directory: {}", data_dir.display());
    let documents = DocumentLoader::new(&data_dir).load()?;
    let pipeline = EmbeddingPipeline::from_settings(settings.chunking, &settings.embedding)?;

    for source in sources {
        println!("\n--- Processing: {} ({}) ---", source.title, source.file);
        let report = build_source_store(&pipeline, &documents, source, &settings.store_dir(source))?;
        println!("Stored {} chunks ({}-d) in {}", report.chunks, report.dim, report.dir.display());
    }
    println!("\nDone. Query a store with: backstory-query <source> '<text>'");
    Ok(())
}
