//! Interactive ward picker.
//!
//! Provides a menu-driven loop using `dialoguer`: pick a ward, see its
//! committed prediction, retry a failed fetch, refresh weather, and write
//! the styled map.

use std::path::PathBuf;

use chrono::Utc;
use dialoguer::{Input, Select};
use flood_map_cli_utils::{MultiProgress, Spinner};
use flood_map_controller::{Session, SessionUpdate};
use flood_map_map::{MapIntent, MapView};
use flood_map_region::RegionStore;

use crate::report;

enum Action {
    SelectWard,
    EnterCode,
    Retry,
    Refresh,
    Summary,
    WriteMap,
    DismissNotifications,
    Quit,
}

impl Action {
    const ALL: &[Self] = &[
        Self::SelectWard,
        Self::EnterCode,
        Self::Retry,
        Self::Refresh,
        Self::Summary,
        Self::WriteMap,
        Self::DismissNotifications,
        Self::Quit,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::SelectWard => "Select a ward",
            Self::EnterCode => "Enter a ward code",
            Self::Retry => "Retry current ward",
            Self::Refresh => "Refresh current ward",
            Self::Summary => "Show risk summary",
            Self::WriteMap => "Write map GeoJSON",
            Self::DismissNotifications => "Dismiss notifications",
            Self::Quit => "Quit",
        }
    }
}

/// Runs the interactive loop until the user quits.
///
/// # Errors
///
/// Returns an error if a prompt fails or the map cannot be written.
pub async fn run(
    multi: &MultiProgress,
    store: &RegionStore,
    session: &mut Session,
) -> Result<(), Box<dyn std::error::Error>> {
    let view = MapView::new(store);

    if session.start().await {
        settle(multi, session, "Loading predictions for all wards...").await?;
    }

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    loop {
        session.notifications_mut().expire(Utc::now());
        report::print_notifications(session.controller().notifications());
        println!();

        let idx = Select::new()
            .with_prompt("What would you like to do?")
            .items(&labels)
            .default(0)
            .interact()?;

        match Action::ALL[idx] {
            Action::SelectWard => {
                if view.is_degraded() {
                    println!("No ward boundaries loaded; enter a code instead.");
                    continue;
                }
                let Some(MapIntent::Select(code)) = pick_ward(store, &view)? else {
                    continue;
                };
                fetch(multi, session, &code).await?;
                report::print_region_state(store, session.controller(), &code);
            }
            Action::EnterCode => {
                let code: String = Input::new().with_prompt("Ward code").interact_text()?;
                fetch(multi, session, &code).await?;
                report::print_region_state(store, session.controller(), &code);
            }
            Action::Retry => {
                if session.retry() {
                    settle(multi, session, "Retrying...").await?;
                    print_selected(store, session);
                } else {
                    println!("Nothing selected yet.");
                }
            }
            Action::Refresh => {
                if session.refresh_tick() {
                    settle(multi, session, "Refreshing...").await?;
                    print_selected(store, session);
                } else {
                    println!("Nothing settled to refresh.");
                }
            }
            Action::Summary => report::print_summary(&session.controller().summary()),
            Action::WriteMap => {
                let path: String = Input::new()
                    .with_prompt("Output path")
                    .default("flood_map.geojson".to_string())
                    .interact_text()?;
                report::write_map(&PathBuf::from(path), &view, session.controller())?;
            }
            Action::DismissNotifications => {
                let ids: Vec<u64> = session
                    .controller()
                    .notifications()
                    .active()
                    .iter()
                    .map(|n| n.id)
                    .collect();
                for id in ids {
                    session.notifications_mut().dismiss(id);
                }
            }
            Action::Quit => break,
        }
    }

    Ok(())
}

fn pick_ward(
    store: &RegionStore,
    view: &MapView<'_>,
) -> Result<Option<MapIntent>, Box<dyn std::error::Error>> {
    let items: Vec<String> = store
        .list_regions()
        .iter()
        .map(|r| format!("{:<6} {}", r.code(), r.name()))
        .collect();

    let idx = Select::new()
        .with_prompt("Ward")
        .items(&items)
        .default(0)
        .interact()?;

    Ok(view.on_click(store.list_regions()[idx].code()))
}

async fn fetch(
    multi: &MultiProgress,
    session: &mut Session,
    code: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    session.select(code);
    settle(multi, session, &format!("Fetching prediction for {code}...")).await
}

async fn settle(
    multi: &MultiProgress,
    session: &mut Session,
    message: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let spinner = Spinner::start(multi, message);
    let updates = session.settle().await?;
    spinner.finish_and_clear();

    for update in updates {
        if let SessionUpdate::Bulk {
            committed: Some(count),
        } = update
        {
            println!("Loaded predictions for {count} wards.");
        }
    }
    Ok(())
}

fn print_selected(store: &RegionStore, session: &Session) {
    if let Some(code) = session.controller().selection().selected_region.clone() {
        report::print_region_state(store, session.controller(), &code);
    }
}
