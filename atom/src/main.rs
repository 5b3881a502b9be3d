use std::path::{Path, PathBuf};

use anyhow::Context;
use atom_format::{
    Atom, AtomKind, AtomPath, Dialects, EngineOptions, Geotag, GpsPosition, Mp4File, TagError,
};
use structopt::clap::AppSettings::*;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

mod error;

use error::Error;

#[derive(Debug, StructOpt)]
struct Output {
    #[structopt(
        short,
        long,
        parse(from_os_str),
        help = "Write to this file instead of editing in place"
    )]
    output: Option<PathBuf>,
}

#[derive(Debug, StructOpt)]
enum Commands {
    #[structopt(name = "info", about = "Show the atom tree of a file")]
    Info {
        #[structopt(long, help = "Print the tree as JSON")]
        json: bool,

        #[structopt(long, help = "Only show the atom at this path, e.g. moov.udta")]
        path: Option<String>,

        #[structopt(name = "file", parse(from_os_str), help = "Path to the MP4/3GP file")]
        file: PathBuf,
    },

    #[structopt(name = "check", about = "Check whether a file can be edited safely")]
    Check {
        #[structopt(name = "file", parse(from_os_str), help = "Path to the MP4/3GP file")]
        file: PathBuf,
    },

    #[structopt(name = "set", about = "Set metadata tags")]
    Set {
        #[structopt(long)]
        title: Option<String>,

        #[structopt(long)]
        description: Option<String>,

        #[structopt(long)]
        author: Option<String>,

        #[structopt(long, help = "Place as `country,city,district`")]
        geotag: Option<Geotag>,

        #[structopt(
            long,
            requires = "geotag",
            help = "Coordinates as `lat,lon[,alt]`, stored with --geotag"
        )]
        gps: Option<GpsPosition>,

        #[structopt(long, help = "Do not write 3GPP user data tags")]
        no_iso: bool,

        #[structopt(long, help = "Do not write iTunes item list tags")]
        no_itunes: bool,

        #[structopt(flatten)]
        output: Output,

        #[structopt(name = "file", parse(from_os_str), help = "Path to the MP4/3GP file")]
        file: PathBuf,
    },

    #[structopt(name = "remove", about = "Remove metadata tags")]
    Remove {
        #[structopt(long)]
        title: bool,

        #[structopt(long)]
        description: bool,

        #[structopt(long)]
        author: bool,

        #[structopt(long)]
        geotag: bool,

        #[structopt(long, help = "Remove author, geotag and GPS position")]
        author_and_location: bool,

        #[structopt(long, help = "Remove all user data and XMP")]
        all: bool,

        #[structopt(flatten)]
        output: Output,

        #[structopt(name = "file", parse(from_os_str), help = "Path to the MP4/3GP file")]
        file: PathBuf,
    },
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "atom",
    about = "Inspect and edit metadata atoms of MP4, 3GP and QuickTime files.",
    settings = &[SubcommandRequiredElseHelp, DisableHelpSubcommand, VersionlessSubcommands]
)]
struct CliOpts {
    #[structopt(short, long, help = "Show verbose output", global = true)]
    verbose: bool,

    #[structopt(subcommand)]
    cmd: Commands,
}

fn open(path: &Path, options: EngineOptions) -> Result<Mp4File, Error> {
    let mut file = Mp4File::new(options);
    file.set_input_file(path);
    file.read_file().map_err(|source| Error::OpenFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(file)
}

fn print_tree(atom: &Atom, depth: usize) {
    use humansize::{file_size_opts as options, FileSize};

    let size = atom.size();
    let human = size
        .file_size(options::BINARY)
        .unwrap_or_else(|_| size.to_string());
    let offset = atom
        .location()
        .map(|x| format!("{:#010x}", x))
        .unwrap_or_else(|| "-".into());

    println!(
        "{:indent$}{:<4}  {:<9}  {:<6}  {:>10}  {:>12}",
        "",
        atom.name().to_string(),
        atom.kind().to_string(),
        atom.storage().to_string(),
        human,
        offset,
        indent = depth * 2,
    );
    for child in atom.children() {
        print_tree(child, depth + 1);
    }
}

fn info(file: PathBuf, path: Option<String>, json: bool) -> anyhow::Result<()> {
    let mut mp4 = open(&file, EngineOptions::default())?;
    let root = mp4.root_mut().context("File has no atoms")?;
    root.expand_all();

    let atom = match path {
        Some(path) => {
            let path = AtomPath::new(&path).map_err(|source| Error::InvalidPath { path, source })?;
            root.find_atom(&path).ok_or(Error::NotFound(path))?
        }
        None => root,
    };

    if json {
        let value = atom.describe();
        let text = serde_json::to_string_pretty(&value).context("Serializing tree failed")?;
        println!("{}", text);
        return Ok(());
    }

    if atom.kind() == AtomKind::Pseudo {
        println!("{}", file.display());
        for child in atom.children() {
            print_tree(child, 1);
        }
    } else {
        print_tree(atom, 0);
    }
    Ok(())
}

fn check(file: PathBuf) -> anyhow::Result<()> {
    let mut mp4 = Mp4File::default();
    mp4.set_input_file(&file);
    let layout = mp4.able_to_process().map_err(|source| Error::Unsupported {
        path: file.clone(),
        source,
    })?;

    println!(
        "{}: brand `{}`, {} atoms, moov at {:#x}, mdat at {:#x}",
        file.display(),
        layout.brand,
        layout.atoms,
        layout.metadata,
        layout.payload
    );
    Ok(())
}

/// Checks, reads, edits and writes `file`, in place unless `output` is given.
fn edit<F>(file: PathBuf, output: Output, options: EngineOptions, f: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut Mp4File) -> Result<(), Error>,
{
    let mut mp4 = Mp4File::new(options);
    mp4.set_input_file(&file);
    mp4.able_to_process().map_err(|source| Error::Unsupported {
        path: file.clone(),
        source,
    })?;

    let output = output.output.unwrap_or_else(|| file.clone());
    mp4.set_output_file(&output);
    mp4.read_file().map_err(|source| Error::OpenFile {
        path: file.clone(),
        source,
    })?;

    f(&mut mp4)?;

    mp4.write_file().map_err(|source| Error::WriteFile {
        path: output.clone(),
        source,
    })?;
    tracing::info!(path = %output.display(), "metadata updated");
    Ok(())
}

fn tag(tag: &'static str, result: Result<(), TagError>) -> Result<(), Error> {
    result.map_err(|source| Error::Tag { tag, source })
}

fn main() {
    let opts = CliOpts::from_iter(wild::args_os());

    let default_level = if opts.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match opts.cmd {
        Commands::Info { json, path, file } => info(file, path, json),
        Commands::Check { file } => check(file),
        Commands::Set {
            title,
            description,
            author,
            geotag,
            gps,
            no_iso,
            no_itunes,
            output,
            file,
        } => {
            let options = EngineOptions::new().with_dialects(Dialects {
                iso: !no_iso,
                itunes: !no_itunes,
                ..Default::default()
            });
            edit(file, output, options, |mp4| {
                if title.is_none() && description.is_none() && author.is_none() && geotag.is_none()
                {
                    return Err(Error::NothingToDo);
                }
                if let Some(title) = &title {
                    tag("title", mp4.set_title(title))?;
                }
                if let Some(description) = &description {
                    tag("description", mp4.set_description(description))?;
                }
                if let Some(author) = &author {
                    tag("author", mp4.set_author(author))?;
                }
                if let Some(geotag) = &geotag {
                    tag("geotag", mp4.set_location(geotag, gps))?;
                }
                Ok(())
            })
        }
        Commands::Remove {
            title,
            description,
            author,
            geotag,
            author_and_location,
            all,
            output,
            file,
        } => edit(file, output, EngineOptions::default(), |mp4| {
            if !(title || description || author || geotag || author_and_location || all) {
                return Err(Error::NothingToDo);
            }
            if all {
                return tag("all metadata", mp4.remove_all_metadata());
            }
            if title {
                tag("title", mp4.remove_title())?;
            }
            if description {
                tag("description", mp4.remove_description())?;
            }
            if author_and_location {
                tag("author and location", mp4.remove_author_and_location())?;
            } else {
                if author {
                    tag("author", mp4.remove_author())?;
                }
                if geotag {
                    tag("geotag", mp4.remove_geotag())?;
                }
            }
            Ok(())
        }),
    };

    if let Err(e) = result {
        eprintln!("{:?}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gps_needs_a_geotag() {
        let args = ["atom", "set", "--gps", "1,2", "f.mp4"];
        assert!(CliOpts::from_iter_safe(&args).is_err());

        let args = ["atom", "set", "--geotag", "A,B,C", "--gps", "1,2", "f.mp4"];
        let opts = CliOpts::from_iter_safe(&args).unwrap();
        match opts.cmd {
            Commands::Set { geotag, gps, .. } => {
                assert!(geotag.is_some());
                assert!(gps.is_some());
            }
            other => panic!("expected set, got {:?}", other),
        }
    }
}
