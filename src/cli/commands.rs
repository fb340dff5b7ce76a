//! Command implementations

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::app::container::AppContainer;
use crate::app::draft_interactor::DraftInteractor;
use crate::app::editor::TimelineEditor;
use crate::app::pipeline::{PipelineReport, StageOutcome};
use crate::cli::args::{DraftArgs, EditArgs, EditOp, ImportArgs, ListArgs, ShowArgs};
use crate::cli::Commands;
use crate::domain::errors::{EditError, EditResult};
use crate::domain::model::{Draft, DraftId};
use crate::error::ReelError;
use crate::utils::time::TimeParser;

/// Dispatch a parsed command
pub async fn run(container: &dyn AppContainer, command: Commands) -> Result<()> {
    let drafts = container.draft_interactor();
    match command {
        Commands::Import(args) => import(&drafts, args).await,
        Commands::Process(args) => process(&drafts, args).await,
        Commands::Edit(args) => edit(&drafts, args).await,
        Commands::Show(args) => show(&drafts, args).await,
        Commands::Steps(args) => steps(&drafts, args).await,
        Commands::List(args) => list(&drafts, args).await,
        Commands::Delete(args) => delete(&drafts, args).await,
    }
}

async fn load(drafts: &DraftInteractor, id: &str) -> Result<Draft> {
    drafts
        .load(&DraftId::from(id))
        .await?
        .ok_or_else(|| ReelError::DraftNotFound { id: id.to_string() }.into())
}

/// Execute the import command; prints the new draft id
pub async fn import(drafts: &DraftInteractor, args: ImportArgs) -> Result<()> {
    info!(input = %args.input.display(), "Importing");
    let draft = drafts
        .import(&args.input, &args.title)
        .await
        .with_context(|| format!("Failed to import {}", args.input.display()))?;

    if !args.no_pipeline {
        let (_, report) = drafts.process(draft.clone()).await?;
        print_report(&report);
    }
    println!("{}", draft.id);
    Ok(())
}

/// Execute the process command
pub async fn process(drafts: &DraftInteractor, args: DraftArgs) -> Result<()> {
    let draft = load(drafts, &args.draft).await?;
    let (_, report) = drafts.process(draft).await?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &PipelineReport) {
    for stage in &report.stages {
        match &stage.outcome {
            StageOutcome::Completed { uri } => eprintln!("{}: {}", stage.field, uri),
            StageOutcome::Failed { error } => {
                eprintln!("{}: failed after {} attempt(s): {}", stage.field, stage.attempts, error)
            }
            StageOutcome::Cancelled => eprintln!("{}: cancelled", stage.field),
        }
    }
}

/// Execute the edit command: apply every operation, then close the editor
pub async fn edit(drafts: &DraftInteractor, args: EditArgs) -> Result<()> {
    let draft = load(drafts, &args.draft).await?;
    let mut session = drafts.open_editor(draft);

    let mut rejected = None;
    for op in &args.ops {
        if let Err(e) = apply(&mut session.editor, op) {
            warn!(op = ?op, error = %e, "Operation rejected");
            eprintln!("rejected {:?}: {}", op, e);
            if args.strict {
                rejected = Some(e);
                break;
            }
        }
    }

    let draft = session.finish().await?;
    if let Some(e) = rejected {
        return Err(ReelError::from(e).into());
    }
    print_timeline(&draft);
    Ok(())
}

/// Apply one operation to the editor
pub fn apply(editor: &mut TimelineEditor, op: &EditOp) -> EditResult<()> {
    match op {
        EditOp::In(at_s) => editor.set_in(*at_s).map(drop),
        EditOp::Out(at_s) => editor.set_out(*at_s).map(drop),
        EditOp::Seek(at_s) => {
            editor.seek(*at_s);
            Ok(())
        }
        EditOp::Add => editor.add_segment().map(drop),
        EditOp::Split => editor.split_at_playhead().map(drop),
        EditOp::Merge => editor.merge_with_next(),
        EditOp::Delete => editor.delete_selected().map(drop),
        EditOp::Speed => editor.cycle_speed().map(drop),
        EditOp::Marker => editor.add_marker().map(drop),
        EditOp::Select(index) => editor.select_index(*index).map(drop),
        EditOp::Move(index) => match editor.draft().ui.selected_segment.clone() {
            Some(id) => editor.move_segment(&id, *index),
            None => Err(EditError::NoSelection),
        },
        EditOp::Rename(label) => match editor.draft().ui.selected_segment.clone() {
            Some(id) => editor.rename_segment(&id, label.clone()),
            None => Err(EditError::NoSelection),
        },
        EditOp::Zoom(zoom) => {
            editor.set_zoom(*zoom);
            Ok(())
        }
        EditOp::Ripple(on) => {
            editor.set_ripple(*on);
            Ok(())
        }
        EditOp::Undo => editor.undo(),
        EditOp::Redo => editor.redo(),
    }
}

fn print_timeline(draft: &Draft) {
    let time = TimeParser::new();
    println!("{} ({})", draft.timeline.title, draft.id);
    println!(
        "source: {}  duration: {}",
        draft.asset.source_uri,
        time.format_time(draft.asset.duration_s)
    );
    for (position, segment) in draft.ordered_segments().enumerate() {
        let selected = if draft.ui.selected_segment.as_ref() == Some(&segment.id) {
            "*"
        } else {
            " "
        };
        println!(
            "{}{:>3}  {} - {}  x{}  {}  [{} marker(s)]",
            selected,
            position,
            time.format_time(segment.start_s),
            time.format_time(segment.end_s),
            segment.speed,
            segment.label,
            segment.markers.len()
        );
    }
    println!("total: {}", time.format_time(draft.total_playback_s()));
}

/// Execute the show command
pub async fn show(drafts: &DraftInteractor, args: ShowArgs) -> Result<()> {
    let draft = load(drafts, &args.draft).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&draft)?);
    } else {
        print_timeline(&draft);
    }
    Ok(())
}

/// Execute the steps command
pub async fn steps(drafts: &DraftInteractor, args: DraftArgs) -> Result<()> {
    let export = drafts
        .export(&DraftId::from(args.draft.as_str()))
        .await?
        .ok_or(ReelError::DraftNotFound { id: args.draft })?;
    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}

/// Execute the list command
pub async fn list(drafts: &DraftInteractor, args: ListArgs) -> Result<()> {
    let summaries = drafts.list().await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    if summaries.is_empty() {
        println!("No drafts");
        return Ok(());
    }
    let time = TimeParser::new();
    for summary in summaries {
        println!(
            "{}  {}  {} segment(s)  {}  {}",
            summary.id,
            summary.title,
            summary.segments,
            time.format_time(summary.playback_s),
            summary.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// Execute the delete command
pub async fn delete(drafts: &DraftInteractor, args: DraftArgs) -> Result<()> {
    drafts.delete(&DraftId::from(args.draft.as_str())).await?;
    println!("Deleted {}", args.draft);
    Ok(())
}
