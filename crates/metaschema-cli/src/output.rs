//! Rendering compiled graphs for stdout

use crate::OutputFormat;
use metaschema_model::{DeclarationId, Document, MultiplexMode, SchemaGraph};
use serde::Serialize;
use std::fmt::Write;
use std::path::Path;

#[derive(Serialize)]
struct Family<'a> {
    source: &'a Path,
    graph: &'a SchemaGraph,
}

pub fn render(graph: &SchemaGraph, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Summary => summary(graph),
        OutputFormat::Json => serde_json::to_string_pretty(graph)?,
        OutputFormat::Yaml => serde_yaml::to_string(graph)?,
    })
}

/// Several families: summaries separated by blank lines, or one JSON/YAML list
pub fn render_all(families: &[(&Path, SchemaGraph)], format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Summary {
        let parts: Vec<String> = families.iter().map(|(_, graph)| summary(graph)).collect();
        return Ok(parts.join("\n"));
    }

    let list: Vec<Family<'_>> = families
        .iter()
        .map(|(source, graph)| Family { source, graph })
        .collect();
    Ok(match format {
        OutputFormat::Yaml => serde_yaml::to_string(&list)?,
        _ => serde_json::to_string_pretty(&list)?,
    })
}

pub fn summary(graph: &SchemaGraph) -> String {
    let mut out = String::new();
    let Some(root) = graph.root() else {
        return out;
    };

    let _ = writeln!(
        out,
        "{}: {} documents, {} declarations, {} multiplexers",
        graph.document(root).name(),
        graph.documents().len(),
        graph.declarations().len(),
        graph.multiplexers().len()
    );

    for document in graph.documents() {
        let _ = writeln!(out, "  {} ({})", document.name(), document.header.source.display());
        write_names(&mut out, "assemblies", graph, &document.assemblies);
        write_names(&mut out, "fields", graph, &document.fields);
        write_names(&mut out, "flags", graph, &document.flags);
        write_imports(&mut out, graph, document);

        if !document.dependencies.is_empty() {
            let deps: Vec<String> = document
                .dependencies
                .iter()
                .map(|(name, dep)| format!("{} -> {}", name, graph.document(graph.dependency_owner(dep)).name()))
                .collect();
            let _ = writeln!(out, "    dependencies: {}", deps.join(", "));
        }

        if !document.multiplexers.is_empty() {
            let mplexes: Vec<String> = document
                .multiplexers
                .iter()
                .map(|&id| {
                    let mplex = graph.multiplexer(id);
                    match &mplex.mode {
                        MultiplexMode::ByKey { index_flag } => format!("{} [by key: {}]", mplex.name, index_flag),
                        MultiplexMode::SingletonOrArray => format!("{} [singleton or array]", mplex.name),
                    }
                })
                .collect();
            let _ = writeln!(out, "    multiplexers: {}", mplexes.join(", "));
        }
    }
    out
}

fn write_names(out: &mut String, label: &str, graph: &SchemaGraph, ids: &[DeclarationId]) {
    if ids.is_empty() {
        return;
    }
    let names: Vec<&str> = ids.iter().map(|&id| graph.declaration(id).name()).collect();
    let _ = writeln!(out, "    {}: {}", label, names.join(", "));
}

fn write_imports(out: &mut String, graph: &SchemaGraph, document: &Document) {
    if document.imported.is_empty() {
        return;
    }
    let names: Vec<&str> = document
        .imported
        .iter()
        .map(|&id| graph.document(id).name())
        .collect();
    let _ = writeln!(out, "    imports: {}", names.join(", "));
}
