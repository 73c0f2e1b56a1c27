mod edit;

use anyhow::Context as _;
use bramble::{
    LanguageHandle, ParserConfig, QueryCursor, Renderer, Tree, load_language, syntax_errors,
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser as _;
use edit::Edit;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Parses files with serialized grammar tables.
#[derive(clap::Parser)]
#[command(name = "bramble", version)]
enum Options {
    /// Prints the syntax tree of a file.
    Parse {
        /// Grammar table (JSON).
        #[arg(long)]
        grammar: Utf8PathBuf,
        path: Utf8PathBuf,
        /// Prints the named nodes as an s-expression.
        #[arg(long)]
        sexp: bool,
        /// Replaces bytes START..END with TEXT, then re-parses. Repeatable;
        /// later edits refer to the text produced by earlier ones.
        #[arg(long = "edit", value_name = "START:END:TEXT")]
        edits: Vec<Edit>,
        #[arg(long, default_value_t = ParserConfig::default().max_versions)]
        max_versions: usize,
        /// Re-parses without reusing subtrees of the previous tree.
        #[arg(long)]
        no_reuse: bool,
    },
    /// Reports syntax errors; fails when there are any.
    Check {
        #[arg(long)]
        grammar: Utf8PathBuf,
        path: Utf8PathBuf,
    },
    /// Prints the captures of a query, in document order.
    Query {
        #[arg(long)]
        grammar: Utf8PathBuf,
        query: Utf8PathBuf,
        path: Utf8PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    match Options::parse() {
        Options::Parse { grammar, path, sexp, edits, max_versions, no_reuse } => {
            let language = load(&grammar)?;
            let mut text = read(&path)?;
            let config =
                ParserConfig::default().max_versions(max_versions).reuse_subtrees(!no_reuse);
            let mut parser = language.parser_with(config);

            let mut tree = parser.parse(text.as_slice(), None);
            log::info!("parsed `{path}`: {}", parser.stats());

            let mut applied = Vec::with_capacity(edits.len());
            for edit in &edits {
                applied.push(edit.apply(&mut text).with_context(|| format!("edit `{edit}`"))?);
            }
            if let Some((first, rest)) = applied.split_first() {
                let stale = rest.iter().fold(tree.edit(first), |stale, edit| stale.edit(edit));
                let reparsed = parser.parse(text.as_slice(), Some(&stale));
                log::info!("re-parsed after {} edits: {}", applied.len(), parser.stats());
                for range in stale.changed_ranges(&reparsed) {
                    log::info!("changed {:?}", range.bytes);
                }
                tree = reparsed;
            }

            print_tree(&tree, sexp);
            Ok(())
        }
        Options::Check { grammar, path } => {
            let language = load(&grammar)?;
            // Diagnostics quote the text, so invalid UTF-8 is replaced first.
            let text = String::from_utf8_lossy(&read(&path)?).into_owned();
            let tree = language.parse(&text);

            let renderer = Renderer::styled();
            let diagnostics = syntax_errors(&tree, &text);
            for diagnostic in &diagnostics {
                eprintln!("{}", diagnostic.render(&renderer, path.as_str(), &text));
            }
            if !diagnostics.is_empty() {
                anyhow::bail!("`{path}`: {} syntax errors", diagnostics.len());
            }
            Ok(())
        }
        Options::Query { grammar, query, path } => {
            let language = load(&grammar)?;
            let source = std::fs::read_to_string(&query)
                .with_context(|| format!("failed to read `{query}`"))?;
            let query =
                language.query(&source).with_context(|| format!("invalid query `{query}`"))?;
            let text = read(&path)?;
            let tree = language.parse(&text);

            let cursor = QueryCursor::new();
            for (query_match, index) in cursor.captures(&query, tree.root_node(), &text) {
                let capture = query_match.captures[index];
                let name = query.capture_name(capture.index).unwrap_or_default();
                let (start, end) = (capture.node.start_point(), capture.node.end_point());
                let range = std::ops::Range::<usize>::from(capture.node.byte_range());
                println!(
                    "pattern {}: @{name} {}:{}-{}:{} `{}`",
                    query_match.pattern_index,
                    start.row + 1,
                    start.column + 1,
                    end.row + 1,
                    end.column + 1,
                    String::from_utf8_lossy(&text[range])
                );
            }
            Ok(())
        }
    }
}

fn load(path: &Utf8Path) -> anyhow::Result<LanguageHandle> {
    let blob = std::fs::read(path).with_context(|| format!("failed to read `{path}`"))?;
    load_language(&blob).with_context(|| format!("failed to load grammar `{path}`"))
}

fn read(path: &Utf8Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read `{path}`"))
}

fn print_tree(tree: &Tree, sexp: bool) {
    if sexp {
        println!("{}", tree.to_sexp());
    } else {
        print!("{}", tree.debug_dump());
    }
}
