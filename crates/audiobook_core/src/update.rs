use crate::state::Batch;
use crate::{plan_tracks, Effect, Msg, PanelState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: PanelState, msg: Msg) -> (PanelState, Vec<Effect>) {
    let effects = match msg {
        Msg::Opened {
            book,
            captured_count,
        } => {
            state.set_book(book);
            state.set_captured_count(captured_count);
            state.refresh_summary();
            Vec::new()
        }
        Msg::TitleEdited(title) => {
            state.set_title(title);
            state.refresh_summary();
            vec![Effect::SaveMetadata(state.book().clone())]
        }
        Msg::AuthorEdited(author) => {
            state.set_author(author);
            state.refresh_summary();
            vec![Effect::SaveMetadata(state.book().clone())]
        }
        Msg::CountRefreshed(count) => {
            state.set_captured_count(count);
            state.refresh_summary();
            Vec::new()
        }
        Msg::ClearClicked => vec![Effect::ClearUrls],
        Msg::ClearReplied(reply) => match reply {
            Ok(reply) => {
                state.set_status(reply.status);
                vec![Effect::RefreshCount]
            }
            Err(_) => {
                state.set_status(
                    "Error: Could not communicate with extension background process",
                );
                Vec::new()
            }
        },
        Msg::CaptureClicked => vec![Effect::StartCapture],
        Msg::CaptureReplied(reply) => {
            match reply {
                Ok(reply) if !reply.status.is_empty() => state.set_status(reply.status),
                _ => state.set_status("Error triggering audio capture."),
            }
            Vec::new()
        }
        Msg::DownloadClicked => {
            if state.is_downloading() {
                return (state, Vec::new());
            }
            let mut effects = vec![Effect::SaveMetadata(state.book().clone())];
            if state.book().is_complete() {
                effects.push(Effect::LoadUrls);
            } else {
                state.set_status("Please enter book title and author name");
            }
            effects
        }
        Msg::UrlsLoaded(urls) => {
            if state.is_downloading() {
                return (state, Vec::new());
            }
            // Metadata may have been edited between the click and the load.
            if !state.book().is_complete() {
                state.set_status("Please enter book title and author name");
                return (state, Vec::new());
            }
            match Batch::new(plan_tracks(&urls, state.book())) {
                None => {
                    state.set_status("No URLs to download");
                    Vec::new()
                }
                Some(batch) => {
                    let first = batch.current().clone();
                    state.set_status(format!("Starting download of {} files...", batch.total()));
                    state.begin_batch(batch);
                    vec![Effect::DownloadTrack(first)]
                }
            }
        }
        Msg::TrackFinished {
            track_number,
            result,
        } => {
            let Some(batch) = state.batch_mut() else {
                return (state, Vec::new());
            };
            if batch.current().metadata.track_number != track_number {
                // Late answer for a track that is no longer in flight.
                return (state, Vec::new());
            }
            let total = batch.total();
            match result.map(|()| batch.advance().cloned()) {
                Ok(Some(next)) => {
                    state.set_status(format!("Downloaded {track_number}/{total} files"));
                    vec![Effect::DownloadTrack(next)]
                }
                Ok(None) => {
                    state.end_batch();
                    state.set_status(format!("Successfully downloaded all {total} files!"));
                    Vec::new()
                }
                Err(message) => {
                    state.end_batch();
                    state.set_status(format!("Error downloading: {message}"));
                    Vec::new()
                }
            }
        }
        Msg::AuthorInvalidated => {
            state.set_author(String::new());
            state.refresh_summary();
            vec![Effect::RefreshCount]
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
