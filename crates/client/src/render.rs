//! Plain-text rendering of results and progress for the terminal.

use plexsync_core::progress::JobProgress;
use plexsync_core::search::SearchResult;
use plexsync_search::RankedResultSet;

/// One line per ranked result, in rank order.
pub fn result_lines(set: &RankedResultSet) -> Vec<String> {
    if set.query.is_empty() {
        return Vec::new();
    }
    if set.results.is_empty() {
        return vec![format!("No results for {:?}", set.query)];
    }
    set.results.iter().map(result_line).collect()
}

pub fn result_line(result: &SearchResult) -> String {
    let mut line = format!("{:>8}  {}", result.key, result.title);

    let context: Vec<&str> = [result.grandparent_title.as_str(), result.parent_title.as_str()]
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect();
    if !context.is_empty() {
        line.push_str(&format!(" ({})", context.join(" / ")));
    }

    line.push_str(&format!(" [{}]", result.media_type));
    if result.kind().supports_persist() {
        line.push_str(" +persist");
    }
    line
}

pub fn job_line(job: &JobProgress) -> String {
    format!("{} {}", job.title, job.label())
}

/// Jobs in `next` whose displayed line differs from `prev`, in table order.
pub fn changed_jobs<'a>(prev: &[JobProgress], next: &'a [JobProgress]) -> Vec<&'a JobProgress> {
    next.iter()
        .filter(|job| {
            prev.iter()
                .find(|p| p.title == job.title)
                .map_or(true, |p| p.label() != job.label())
        })
        .collect()
}
