//! Build automation tasks for statsdb
//!
//! Currently only generates the CLI reference from the clap definitions.

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for statsdb", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<statsdb_ingest::Cli>();

    let content = format!(
        r#"# statsdb CLI Reference

Generated from the CLI source code on {}.

## Overview

`statsdb` loads a directory of `.stats.json` simulation results into the
`stats` table of a SQLite database. Each file name carries the run
parameters:

```text
Z1=a,b,c;Z2=d,e,f;Z3=g,h,i;nn=<ints>;p=<decimal>;seed=<hex>;.stats.json
```

## Quick Start

```bash
# Ingest a sweep into ./stats.db
statsdb runs/

# Larger transactions, fixed worker count, separate database
statsdb runs/ --database sweep.db --batch-size 2000 --workers 8

# Skip runs that are already stored, then move ingested files to runs/trash/<date>
statsdb runs/ --duplicates ignore --cleanup
```

## Environment

| Variable | Flag |
|----------|------|
| `STATSDB_DATABASE` | `--database` |
| `STATSDB_WORKERS` | `--workers` |
| `STATSDB_BATCH_SIZE` | `--batch-size` |
| `STATSDB_PROGRESS_INTERVAL` | `--progress-interval` |
| `STATSDB_DUPLICATE_POLICY` | `--duplicates` |

Logging is configured with `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR`
and `LOG_FILTER`. A `.env` file in the working directory is read first.

## Exit Status

- `0`: every batch committed
- `1`: a batch was rolled back, or the database failed
- `2`: invalid configuration

{}

---

*This documentation is automatically generated from the CLI source code. To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());
    Ok(())
}
