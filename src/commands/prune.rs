use std::io::IsTerminal;

use anyhow::bail;
use color_print::cformat;
use worktree_hub::styling::{
    HINT, INFO_EMOJI, SUCCESS_EMOJI, WARNING, WARNING_EMOJI, format_with_gutter, println,
};

use super::{Context, confirm};

/// Preview, confirm, then prune.
///
/// The preview is always shown. Applying re-checks that git would prune the
/// same entries the user just saw.
pub fn handle_prune(ctx: &Context, dry_run: bool, yes: bool) -> anyhow::Result<()> {
    let plan = ctx.repo.prune_preview()?;

    if plan.is_empty() {
        println!("{INFO_EMOJI} {HINT}Nothing to prune{HINT:#}");
        return Ok(());
    }

    let count = plan.entries().len();
    let plural = if count == 1 { "y" } else { "ies" };
    println!("{WARNING_EMOJI} {WARNING}Would prune {count} worktree entr{plural}:{WARNING:#}");
    println!("{}", format_with_gutter(&plan.entries().join("\n"), None));

    if dry_run {
        return Ok(());
    }

    let confirmed = if yes || !ctx.settings.confirm_dangerous_operations {
        true
    } else if !std::io::stdin().is_terminal() {
        bail!("Refusing to prune without confirmation; pass --yes");
    } else {
        confirm("Prune these entries?")?
    };

    if !confirmed {
        println!("{INFO_EMOJI} {HINT}Prune cancelled{HINT:#}");
        return Ok(());
    }

    let pruned = ctx.repo.prune_apply(&plan)?;
    log::debug!("Pruned: {pruned:?}");
    println!(
        "{}",
        cformat!("{SUCCESS_EMOJI} <green>Pruned <bold>{count}</> worktree entr{plural}</>")
    );
    Ok(())
}
