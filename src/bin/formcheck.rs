use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser as ClapParser;

use formsite::formschema::FormSchema;
use formsite::path::extension_eq;
use formsite::util::my_read_to_string;

#[derive(clap::Parser, Debug)]
/// Check form schema files before publishing them to a form
/// directory. Reports every file that the server would reject (and
/// then skip) at scan time.
struct Args {
    /// Also print the field list of each valid schema.
    #[clap(long)]
    verbose: bool,

    /// Schema files (`<name>.json`), or directories to scan for them.
    #[clap(required(true))]
    paths: Vec<PathBuf>,
}

fn schema_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut in_dir = Vec::new();
            for entry in std::fs::read_dir(path).with_context(
                || anyhow!("reading dir {path:?}"))?
            {
                let p = entry?.path();
                if p.is_file() && extension_eq(&p, "json") {
                    in_dir.push(p);
                }
            }
            if in_dir.is_empty() {
                bail!("no *.json files in dir {path:?}");
            }
            in_dir.sort();
            files.append(&mut in_dir);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn check_file(path: &Path) -> Result<FormSchema> {
    Ok(FormSchema::from_json_str(&my_read_to_string(path)?)?)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let files = schema_files(&args.paths)?;
    let mut n_bad = 0;
    for path in &files {
        match check_file(path) {
            Ok(schema) => {
                println!("OK      {}", path.display());
                if args.verbose {
                    println!("        subject {:?}, send to {:?}",
                             schema.subject, schema.send_to);
                    for field in &schema.fields {
                        println!("        - {:?} ({:?}){}",
                                 field.wire_key(), field.control,
                                 if field.required { ", required" } else { "" });
                    }
                }
            }
            Err(e) => {
                n_bad += 1;
                println!("ERROR   {}: {e:#}", path.display());
            }
        }
    }
    if n_bad > 0 {
        bail!("{n_bad} of {} schema file(s) failed the check", files.len());
    }
    Ok(())
}
