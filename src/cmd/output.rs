use anyhow::Result;
use serde::Serialize;

use streamsift::model::Library;
use streamsift::{Candidate, CatalogPage, Episode, ItemDetail};

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_page(page: &CatalogPage, number: u32, json: bool) -> Result<()> {
    if json {
        return print_json(page);
    }
    for item in &page.items {
        println!("{}\t{:?}\t{}", item.id, item.kind, item.title);
    }
    if page.items.is_empty() {
        eprintln!("No results");
    }
    if page.has_next_page {
        eprintln!("More results: --page {}", number + 1);
    }
    Ok(())
}

pub fn print_detail(detail: &ItemDetail, json: bool) -> Result<()> {
    if json {
        return print_json(detail);
    }
    println!("{}", detail.title);
    if !detail.genres.is_empty() {
        println!("Genres: {}", detail.genres.join(", "));
    }
    let status = if detail.completed {
        "completed"
    } else {
        "ongoing"
    };
    println!("Status: {status}");
    if let Some(thumb) = &detail.thumbnail_url {
        println!("Thumbnail: {thumb}");
    }
    if let Some(description) = &detail.description {
        println!("\n{description}");
    }
    Ok(())
}

pub fn print_episodes(episodes: &[Episode], json: bool) -> Result<()> {
    if json {
        return print_json(episodes);
    }
    for episode in episodes {
        println!("{}\t{}\t{}", episode.id, episode.number, episode.name);
        if let Some(details) = &episode.details {
            println!("\t{details}");
        }
    }
    Ok(())
}

pub fn print_candidates(candidates: &[Candidate], json: bool) -> Result<()> {
    if json {
        return print_json(candidates);
    }
    if candidates.is_empty() {
        eprintln!("No playable streams found");
        return Ok(());
    }
    for candidate in candidates {
        println!("{}\t{}", candidate.label, candidate.playback_url);
        for (name, value) in &candidate.headers {
            println!("\theader {name}: {value}");
        }
        for track in &candidate.subtitle_tracks {
            println!("\tsubtitle {}: {}", track.label, track.url);
        }
        if let Some(index) = candidate.audio_track_index {
            println!("\taudio track {index}");
        }
    }
    Ok(())
}

pub fn print_libraries(libraries: &[Library], json: bool) -> Result<()> {
    if json {
        return print_json(libraries);
    }
    for library in libraries {
        println!("{}\t{}", library.id, library.name);
    }
    Ok(())
}
