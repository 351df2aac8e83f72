//! Instruction text for each kind of request
//!
//! File transforms are language-aware: the instruction names the language and
//! the idioms the model should favour.

use crate::domain::{FolderTransform, TaskKind, TaskSpec};

const RAW_OUTPUT: &str =
    "Output ONLY the complete file content. Do not add commentary or Markdown code fences.";

fn task(kind: TaskKind, instruction: impl Into<String>) -> TaskSpec {
    TaskSpec { kind, instruction: instruction.into(), question: None, focus: None }
}

/// Raw prompt, optionally about attached files.
pub fn one_shot(prompt: &str, with_files: bool) -> TaskSpec {
    let instruction = if with_files {
        "You are an expert senior software engineer. Use the attached file to answer the request."
    } else {
        ""
    };
    TaskSpec { question: Some(prompt.to_string()), ..task(TaskKind::OneShot, instruction) }
}

pub fn explain() -> TaskSpec {
    task(
        TaskKind::Explain,
        "Explain the following file in full detail:\n\
         - overall purpose\n\
         - key functions/classes\n\
         - how data flows\n\
         - important design decisions\n\
         - potential pitfalls",
    )
}

pub fn fix(language: &str) -> TaskSpec {
    let header = match language {
        "python" => "You are a senior Python engineer.\n\
             Fix all bugs, inefficiencies, missing checks, and anti-patterns.\n\
             Preserve EXACT external behavior and public API."
            .to_string(),
        "cpp" => "You are a senior C++17 engineer.\n\
             Fix all bugs, undefined behavior, memory issues, and anti-patterns.\n\
             Prefer RAII, smart pointers, const-correctness, and modern STL.\n\
             Preserve observable behavior and public interface."
            .to_string(),
        "java" => "You are a senior Java engineer.\n\
             Fix all bugs and anti-patterns using modern Java best practices.\n\
             Preserve behavior and public API."
            .to_string(),
        "kotlin" => "You are a senior Kotlin/Android engineer.\n\
             Fix all bugs and improve safety using idiomatic Kotlin.\n\
             Preserve behavior and public API."
            .to_string(),
        "javascript" | "typescript" => format!(
            "You are a senior {language} engineer.\n\
             Fix all bugs, race conditions, and performance issues.\n\
             Use modern language features.\n\
             Preserve the observable behavior."
        ),
        "html" | "css" => format!(
            "You are a senior {} engineer.\n\
             Clean up structure, fix obvious issues, and keep the same visual behavior.",
            language.to_uppercase()
        ),
        _ => "You are a senior software engineer.\n\
             Fix all obvious bugs, inefficiencies, missing checks, and anti-patterns.\n\
             Preserve the same external behavior and semantics."
            .to_string(),
    };
    task(
        TaskKind::Fix,
        format!("{header}\nIf the file needs no changes, return it unchanged.\n{RAW_OUTPUT}"),
    )
}

pub fn refactor(language: &str) -> TaskSpec {
    let header = match language {
        "python" => "You are a senior Python engineer.\n\
             Refactor this file for readability, maintainability, structure, and comments.\n\
             Maintain EXACT external behavior."
            .to_string(),
        "cpp" => "You are a senior C++17 engineer.\n\
             Refactor for clarity, RAII, const-correctness, and better structure.\n\
             Keep the public API and semantics unchanged."
            .to_string(),
        "java" => "You are a senior Java engineer.\n\
             Refactor using clean OOP design, clear naming, and modern Java patterns.\n\
             Maintain existing behavior and public API."
            .to_string(),
        "kotlin" => "You are a senior Kotlin/Android engineer.\n\
             Refactor to idiomatic Kotlin, improving null-safety and readability.\n\
             Preserve behavior and signatures."
            .to_string(),
        "javascript" | "typescript" => format!(
            "You are a senior {language} engineer.\n\
             Refactor for readability, modularity, and maintainability.\n\
             Use modern language features. Preserve behavior."
        ),
        "html" | "css" => format!(
            "You are a senior {} engineer.\n\
             Refactor for cleaner structure, semantics, and maintainability.\n\
             Keep the same visual behavior.",
            language.to_uppercase()
        ),
        _ => "You are a senior software engineer.\n\
             Refactor this file for readability, maintainability, structure, and comments.\n\
             Maintain the same external behavior."
            .to_string(),
    };
    task(TaskKind::Refactor, format!("{header}\n{RAW_OUTPUT}"))
}

pub fn rewrite(language: &str) -> TaskSpec {
    let base = "You are a principal-level software architect.\n\
         Completely REWRITE this module with a modern, clean, modular architecture.\n\
         You MAY:\n\
         - change function and class names\n\
         - split large functions into smaller ones\n\
         - introduce classes or interfaces where appropriate\n\
         - reorganize responsibilities (I/O vs core logic vs config)\n\
         - remove dead code and legacy hacks\n\
         You MUST:\n\
         - preserve the overall PURPOSE of the module\n\
         - keep it usable in the same general context\n\
         - write idiomatic, production-quality code for this language";
    let language_line = match language {
        "python" => "Language: Python. Use type hints and clear modules.".to_string(),
        "cpp" => "Language: C++17. Use RAII, smart pointers, and the STL; avoid raw new/delete."
            .to_string(),
        "java" => "Language: Java. Use clear packages, interfaces, and patterns.".to_string(),
        "kotlin" => "Language: Kotlin. Use data classes, extension functions, and null-safety."
            .to_string(),
        "javascript" | "typescript" => format!(
            "Language: {language}. Use modern modules, async/await, \
             and clear separation of concerns."
        ),
        "html" | "css" => format!(
            "Language: {}. Use semantic structure and maintain visual intent.",
            language.to_uppercase()
        ),
        "text" => "Language: generic code/text.".to_string(),
        other => format!("Language: {other}."),
    };
    task(TaskKind::Rewrite, format!("{base}\n{language_line}\n{RAW_OUTPUT}"))
}

pub fn for_transform(transform: FolderTransform, language: &str) -> TaskSpec {
    match transform {
        FolderTransform::Fix => fix(language),
        FolderTransform::Refactor => refactor(language),
        FolderTransform::Rewrite => rewrite(language),
    }
}

pub fn diff() -> TaskSpec {
    task(
        TaskKind::Diff,
        "Compare the two files below. The first file is the old version, the second the new one.\n\
         If they are identical, say that there are no differences.\n\
         Otherwise provide:\n\
         - a unified diff\n\
         - summary of functional changes\n\
         - improvements introduced\n\
         - potential regressions\n\
         - style / architecture changes\n\
         - recommendations for further improvements",
    )
}

pub fn analyze(focus: Option<&str>) -> TaskSpec {
    TaskSpec {
        focus: focus.map(str::to_string),
        ..task(
            TaskKind::Analyze,
            "Analyze the ENTIRE project below.\n\
             For every important code file, provide:\n\
             - purpose summary\n\
             - logic explanation\n\
             - major bugs or risks\n\
             - inefficiencies\n\
             - weak architecture\n\
             - security issues\n\
             - dead code\n\
             - concrete refactor recommendations\n\
             Then propose:\n\
             - improved folder structure\n\
             - improved module boundaries\n\
             - improved architecture\n\
             - cleanup and modernization plan",
        )
    }
}

pub fn project_qa(question: &str) -> TaskSpec {
    TaskSpec {
        question: Some(question.to_string()),
        ..task(
            TaskKind::ProjectQa,
            "Answer the question about this codebase using only the files given below.\n\
             Cite file paths when you refer to code.",
        )
    }
}

pub fn generate(description: &str, target: &str) -> TaskSpec {
    TaskSpec {
        question: Some(description.to_string()),
        ..task(
            TaskKind::Generate,
            format!(
                "Generate the file `{target}` from the specification in the request.\n\
                 Any project files below are context only; match their conventions.\n\
                 {RAW_OUTPUT}"
            ),
        )
    }
}

pub fn chat() -> TaskSpec {
    task(
        TaskKind::Chat,
        "You are in an ongoing conversation with a developer. Attached files are listed first, \
         followed by the conversation so far. Reply to the last user message.",
    )
}

/// Role sent as the system prompt for a task kind.
pub fn system_role(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::Analyze | TaskKind::Rewrite => "You are a principal-level software architect.",
        TaskKind::Chat => "You are a helpful senior software engineer pairing with a developer.",
        _ => "You are an expert senior software engineer.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_instruction_is_language_aware() {
        assert!(fix("python").instruction.contains("senior Python engineer"));
        assert!(fix("cpp").instruction.contains("RAII"));
        assert!(fix("typescript").instruction.contains("senior typescript engineer"));
        assert!(fix("css").instruction.contains("senior CSS engineer"));
        assert!(fix("text").instruction.contains("senior software engineer"));
    }

    #[test]
    fn transforms_ask_for_raw_file_output() {
        use FolderTransform::{Fix, Refactor, Rewrite};
        for transform in [Fix, Refactor, Rewrite] {
            let spec = for_transform(transform, "rust");
            assert_eq!(spec.kind, transform.task_kind());
            assert!(spec.instruction.contains("Output ONLY the complete file content"));
        }
    }

    #[test]
    fn raw_one_shot_has_no_instruction() {
        let spec = one_shot("what is a monad?", false);
        assert!(spec.instruction.is_empty());
        assert_eq!(spec.question.as_deref(), Some("what is a monad?"));
    }
}
