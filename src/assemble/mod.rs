//! Context assembly
//!
//! Builds the bounded `PromptEnvelope` for one request. The body is laid out
//! as instruction, manifest, delimited file sections and finally the user's
//! request. Files that do not fit the byte ceiling are left out whole and the
//! manifest says so. The request itself is never cut.

pub mod tasks;

use crate::domain::{
    ChatRole, ChatTranscript, FileRecord, ManifestEntry, ManifestStatus, ProjectSnapshot,
    PromptEnvelope, TaskSpec,
};
use crate::error::AppError;
use crate::utils::estimate_tokens;

pub const OMITTED_MARK: &str = " (omitted for size)";
pub const TRUNCATED_MARK: &str = " (truncated)";

/// Blank-line separators between the (at most four) body parts.
const PART_SEPARATORS: usize = 3;

/// Opening delimiter for a file section.
pub fn begin_marker(path: &str) -> String {
    format!("===== BEGIN FILE: {path} =====")
}

/// Closing delimiter for a file section.
pub fn end_marker(path: &str) -> String {
    format!("===== END FILE: {path} =====")
}

/// Assemble a snapshot and task into an envelope whose body fits `ceiling` bytes.
///
/// Fails with `RequestTooLarge` when the instruction and request leave no
/// room for even a one-line manifest.
pub fn assemble(
    snapshot: &ProjectSnapshot,
    task: &TaskSpec,
    ceiling: usize,
) -> Result<PromptEnvelope, AppError> {
    let files: Vec<&FileRecord> = snapshot.files.iter().collect();
    let head = render_head(task);
    let tail = match &task.question {
        Some(question) if head.is_empty() && files.is_empty() => question.clone(),
        Some(question) => format!("## Request\n{question}\n"),
        None => String::new(),
    };
    build(tasks::system_role(task.kind), head, &files, tail, ceiling)
}

/// Assemble the chat transcript into an envelope whose body fits `ceiling` bytes.
///
/// The newest turns win: when the conversation does not fit, the oldest turns
/// are dropped first and a note records how many. Attachments then get
/// whatever room is left.
pub fn assemble_chat(
    transcript: &ChatTranscript,
    ceiling: usize,
) -> Result<PromptEnvelope, AppError> {
    let task = tasks::chat();
    let head = render_head(&task);

    let mut files: Vec<&FileRecord> = transcript.files.iter().collect();
    if let Some(project) = &transcript.project {
        files.extend(project.files.iter());
    }

    let reserved = head.len() + minimal_manifest_bound(&files) + PART_SEPARATORS;
    let allowance = ceiling.saturating_sub(reserved);
    let tail = render_conversation(transcript, allowance);

    build(tasks::system_role(task.kind), head, &files, tail, ceiling)
}

fn build(
    system_role: &str,
    head: String,
    files: &[&FileRecord],
    tail: String,
    ceiling: usize,
) -> Result<PromptEnvelope, AppError> {
    let present = [!head.is_empty(), !files.is_empty(), !files.is_empty(), !tail.is_empty()];
    let separators = present.iter().filter(|p| **p).count().saturating_sub(1);
    let request = head.len() + tail.len() + separators;

    let needed = request + minimal_manifest_bound(files);
    if needed > ceiling {
        return Err(AppError::RequestTooLarge { needed, ceiling });
    }

    // The full listing is used whenever it fits; otherwise no file can fit either.
    let listing = request + manifest_upper_bound(files);
    let full_manifest = listing <= ceiling;
    let mut budget = if full_manifest { ceiling - listing } else { 0 };
    let mut overflowed = !full_manifest;

    let mut manifest = Vec::with_capacity(files.len());
    let mut sections = Vec::new();
    for file in files {
        if !overflowed {
            let section = render_file_section(file);
            // +1 for the separator that joins sections
            if section.len() + 1 <= budget {
                budget -= section.len() + 1;
                sections.push(section);
                let status = if file.truncated {
                    ManifestStatus::IncludedTruncated
                } else {
                    ManifestStatus::Included
                };
                manifest.push(ManifestEntry { path: file.relative_path.clone(), status });
                continue;
            }
            overflowed = true;
        }
        manifest.push(ManifestEntry {
            path: file.relative_path.clone(),
            status: ManifestStatus::OmittedForSize,
        });
    }

    let mut parts: Vec<String> = Vec::with_capacity(4);
    if !head.is_empty() {
        parts.push(head);
    }
    if !files.is_empty() {
        if full_manifest {
            parts.push(render_manifest(&manifest));
        } else {
            parts.push(render_compact_manifest(&manifest, ceiling - request));
        }
    }
    if !sections.is_empty() {
        parts.push(sections.join("\n"));
    }
    if !tail.is_empty() {
        parts.push(tail);
    }
    let body = parts.join("\n");

    let estimated_token_count = estimate_tokens(system_role) + estimate_tokens(&body);
    Ok(PromptEnvelope {
        system_role: system_role.to_string(),
        manifest,
        body,
        estimated_token_count,
    })
}

fn render_head(task: &TaskSpec) -> String {
    let mut head = String::new();
    if !task.instruction.is_empty() {
        head.push_str(&task.instruction);
        head.push('\n');
    }
    if let Some(focus) = task.focus.as_deref().filter(|f| !f.trim().is_empty()) {
        head.push_str(&format!("Focus especially on: {}\n", focus.trim()));
    }
    head
}

fn manifest_header(count: usize) -> String {
    format!("## Files ({count})\n")
}

/// Size of the manifest if every entry carried the longest mark.
fn manifest_upper_bound(files: &[&FileRecord]) -> usize {
    if files.is_empty() {
        return 0;
    }
    manifest_header(files.len()).len()
        + files.iter().map(|f| f.relative_path.len() + OMITTED_MARK.len() + 3).sum::<usize>()
}

fn render_manifest(entries: &[ManifestEntry]) -> String {
    let mut out = manifest_header(entries.len());
    for entry in entries {
        let mark = match entry.status {
            ManifestStatus::Included => "",
            ManifestStatus::IncludedTruncated => TRUNCATED_MARK,
            ManifestStatus::OmittedForSize => OMITTED_MARK,
        };
        out.push_str(&format!("- {}{}\n", entry.path, mark));
    }
    out
}

fn remaining_note(count: usize) -> String {
    format!("- ... and {count} more files (omitted for size)\n")
}

/// Smallest manifest that still accounts for every file: the header and a
/// single "and N more" line.
fn compact_manifest_bound(files: &[&FileRecord]) -> usize {
    if files.is_empty() {
        return 0;
    }
    manifest_header(files.len()).len() + remaining_note(files.len()).len()
}

fn minimal_manifest_bound(files: &[&FileRecord]) -> usize {
    manifest_upper_bound(files).min(compact_manifest_bound(files))
}

/// Manifest for when the full listing does not fit in `room` bytes. Lists
/// as many paths as fit and counts the rest.
fn render_compact_manifest(entries: &[ManifestEntry], room: usize) -> String {
    let mut out = manifest_header(entries.len());
    let reserve = remaining_note(entries.len()).len();
    let mut listed = 0;
    for entry in entries {
        let line = format!("- {}{}\n", entry.path, OMITTED_MARK);
        if out.len() + line.len() + reserve > room {
            break;
        }
        out.push_str(&line);
        listed += 1;
    }
    if listed < entries.len() {
        out.push_str(&remaining_note(entries.len() - listed));
    }
    out
}

fn render_file_section(file: &FileRecord) -> String {
    let mut section = String::with_capacity(file.content.len() + file.relative_path.len() * 2 + 48);
    section.push_str(&begin_marker(&file.relative_path));
    section.push('\n');
    section.push_str(&file.content);
    if !file.content.is_empty() && !file.content.ends_with('\n') {
        section.push('\n');
    }
    section.push_str(&end_marker(&file.relative_path));
    section.push('\n');
    section
}

fn render_turn(role: ChatRole, text: &str) -> String {
    let label = match role {
        ChatRole::User => "User",
        ChatRole::Assistant => "Assistant",
    };
    format!("### {label}\n{}\n", text.trim_end())
}

fn omitted_turns_note(count: usize) -> String {
    format!("[{count} earlier turns omitted for size]\n")
}

/// Render as many trailing turns as fit in `allowance` bytes. The last turn is
/// always kept; `build` rejects the request if even that is too large.
fn render_conversation(transcript: &ChatTranscript, allowance: usize) -> String {
    let header = "## Conversation\n";
    let rendered: Vec<String> =
        transcript.turns.iter().map(|t| render_turn(t.role, &t.text)).collect();
    if rendered.is_empty() {
        return String::new();
    }

    let note_reserve = omitted_turns_note(rendered.len()).len();
    let mut used = header.len();
    let mut first_kept = rendered.len();
    for (idx, turn) in rendered.iter().enumerate().rev() {
        let reserve = if idx > 0 { note_reserve } else { 0 };
        let is_last = idx == rendered.len() - 1;
        if !is_last && used + turn.len() + reserve > allowance {
            break;
        }
        used += turn.len();
        first_kept = idx;
    }

    let mut out = String::from(header);
    if first_kept > 0 {
        out.push_str(&omitted_turns_note(first_kept));
    }
    for turn in &rendered[first_kept..] {
        out.push_str(turn);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskKind;
    use std::path::PathBuf;

    fn record(path: &str, content: &str) -> FileRecord {
        FileRecord {
            relative_path: path.to_string(),
            content: content.to_string(),
            truncated: false,
            size_bytes: content.len() as u64,
        }
    }

    fn snapshot(files: Vec<FileRecord>) -> ProjectSnapshot {
        ProjectSnapshot::new(PathBuf::from("/project"), files)
    }

    #[test]
    fn manifest_precedes_file_bodies() {
        let snap = snapshot(vec![record("a.rs", "fn a() {}\n"), record("b.rs", "fn b() {}")]);
        let spec = tasks::project_qa("what does a do?");
        let envelope = assemble(&snap, &spec, 10_000).expect("fits");

        let manifest_at = envelope.body.find("## Files (2)").expect("manifest");
        let a_at = envelope.body.find(&begin_marker("a.rs")).expect("a section");
        let b_at = envelope.body.find(&begin_marker("b.rs")).expect("b section");
        let request_at = envelope.body.find("## Request\nwhat does a do?").expect("request");
        assert!(manifest_at < a_at && a_at < b_at && b_at < request_at);
        assert!(envelope.body.contains("fn b() {}\n===== END FILE: b.rs ====="));
        assert_eq!(envelope.omitted_files().count(), 0);
    }

    #[test]
    fn raw_one_shot_body_is_the_prompt() {
        let spec = tasks::one_shot("hello there", false);
        let envelope = assemble(&snapshot(vec![]), &spec, 1000).expect("fits");
        assert_eq!(envelope.body, "hello there");
        assert!(envelope.manifest.is_empty());
    }

    #[test]
    fn files_after_the_first_overflow_are_omitted_whole() {
        let snap = snapshot(vec![
            record("a.txt", &"a".repeat(100)),
            record("b.txt", &"b".repeat(400)),
            record("c.txt", "c"),
        ]);
        let envelope = assemble(&snap, &tasks::explain(), 700).expect("fits");

        let statuses: Vec<ManifestStatus> = envelope.manifest.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![
                ManifestStatus::Included,
                ManifestStatus::OmittedForSize,
                ManifestStatus::OmittedForSize
            ]
        );
        assert!(envelope.body.contains("- b.txt (omitted for size)"));
        assert!(envelope.body.contains("- c.txt (omitted for size)"));
        assert!(!envelope.body.contains(&begin_marker("c.txt")));
        assert!(envelope.body.len() <= 700);
    }

    #[test]
    fn body_never_exceeds_ceiling() {
        let files: Vec<FileRecord> = (0..20)
            .map(|i| record(&format!("dir/file_{i:02}.py"), &"x = 1\n".repeat(i * 7)))
            .collect();
        let snap = snapshot(files);
        let mut spec = tasks::analyze(Some("security"));
        spec.question = Some("é".repeat(50));

        for ceiling in [0, 1, 10, 64, 200, 512, 999, 1500, 4096, 100_000] {
            match assemble(&snap, &spec, ceiling) {
                Ok(envelope) => assert!(
                    envelope.body.len() <= ceiling,
                    "ceiling {ceiling} exceeded: {}",
                    envelope.body.len()
                ),
                Err(err) => assert!(matches!(err, AppError::RequestTooLarge { .. })),
            }
        }
    }

    #[test]
    fn truncated_files_are_flagged_in_manifest() {
        let mut big = record("big.log", "partial");
        big.truncated = true;
        let envelope = assemble(&snapshot(vec![big]), &tasks::explain(), 10_000).expect("fits");
        assert_eq!(envelope.manifest[0].status, ManifestStatus::IncludedTruncated);
        assert!(envelope.body.contains("- big.log (truncated)"));
    }

    #[test]
    fn assembly_is_deterministic() {
        let snap = snapshot(vec![record("x.py", "print(1)"), record("y.py", "print(2)")]);
        let spec = tasks::fix("python");
        similar_asserts::assert_eq!(
            assemble(&snap, &spec, 5000).expect("fits"),
            assemble(&snap, &spec, 5000).expect("fits")
        );
    }

    #[test]
    fn focus_is_rendered_after_instruction() {
        let snap = snapshot(vec![record("m.go", "package m")]);
        let envelope = assemble(&snap, &tasks::analyze(Some("auth")), 5000).expect("fits");
        assert!(envelope.body.contains("Focus especially on: auth\n"));
        assert_eq!(envelope.system_role, tasks::system_role(TaskKind::Analyze));
        assert!(envelope.estimated_token_count > 0);
    }

    #[test]
    fn chat_drops_oldest_turns_first() {
        let mut transcript = ChatTranscript::default();
        for i in 0..10 {
            transcript.push(ChatRole::User, format!("question {i} {}", "q".repeat(80)));
            transcript.push(ChatRole::Assistant, format!("answer {i} {}", "a".repeat(80)));
        }
        transcript.push(ChatRole::User, "latest question");

        let envelope = assemble_chat(&transcript, 800).expect("fits");
        assert!(envelope.body.len() <= 800);
        assert!(envelope.body.contains("latest question"));
        assert!(envelope.body.contains("earlier turns omitted for size"));
        assert!(!envelope.body.contains("question 0 "));
    }

    #[test]
    fn chat_includes_attachments_and_project_files() {
        let mut transcript = ChatTranscript::default();
        transcript.attach_file(record("notes.md", "# Notes"));
        transcript.project = Some(snapshot(vec![record("src/lib.rs", "pub fn f() {}")]));
        transcript.push(ChatRole::User, "what does f do?");

        let envelope = assemble_chat(&transcript, 10_000).expect("fits");
        let paths: Vec<&str> = envelope.manifest.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["notes.md", "src/lib.rs"]);
        assert!(envelope.body.contains("### User\nwhat does f do?\n"));
        assert!(!envelope.body.contains("omitted"));
    }

    #[test]
    fn request_that_cannot_fit_is_rejected_not_cut() {
        let spec = tasks::one_shot("please summarize the attached text", false);
        let err = assemble(&snapshot(vec![]), &spec, 10).unwrap_err();
        assert!(matches!(err, AppError::RequestTooLarge { needed: 34, ceiling: 10 }));

        let snap = snapshot(vec![record("a.py", "x = 1")]);
        let err = assemble(&snap, &tasks::project_qa("why?"), 60).unwrap_err();
        assert!(matches!(err, AppError::RequestTooLarge { ceiling: 60, .. }));
    }

    #[test]
    fn long_manifest_is_compacted_and_request_kept() {
        let files: Vec<FileRecord> = (0..12)
            .map(|i| record(&format!("src/module_{i:02}/implementation.py"), "pass\n"))
            .collect();
        let snap = snapshot(files);
        let spec = tasks::project_qa("Which module handles login?");

        let envelope = assemble(&snap, &spec, 500).expect("fits");
        assert!(envelope.body.len() <= 500);
        assert!(envelope.body.ends_with("## Request\nWhich module handles login?\n"));
        assert!(envelope.body.contains("## Files (12)"));
        assert!(envelope.body.contains("more files (omitted for size)"));
        assert_eq!(envelope.omitted_files().count(), 12);
    }

    #[test]
    fn chat_turn_too_large_for_ceiling_is_rejected() {
        let mut transcript = ChatTranscript::default();
        transcript.push(ChatRole::User, "x".repeat(2_000));
        let err = assemble_chat(&transcript, 500).unwrap_err();
        assert!(matches!(err, AppError::RequestTooLarge { ceiling: 500, .. }));
    }
}
