use crate::session::ChatTurn;

/// Separator placed between retrieved passages
pub const PASSAGE_SEPARATOR: &str = "\n\n";

/// Build the grounding prompt for `question` from passages in retrieval order.
///
/// The model is told to answer only from the supplied context and to say it
/// does not know otherwise. Passages and question are embedded verbatim.
pub fn compose_prompt<S: AsRef<str>>(question: &str, passages: &[S]) -> String {
    compose_conversational_prompt(&[], question, passages)
}

/// Like [`compose_prompt`], with earlier turns of the conversation placed
/// before the context so follow-up questions can be read against them.
pub fn compose_conversational_prompt<S: AsRef<str>>(
    history: &[ChatTurn],
    question: &str,
    passages: &[S],
) -> String {
    let context = passages
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<&str>>()
        .join(PASSAGE_SEPARATOR);

    let mut prompt = String::from(
        "You are an AI assistant that answers questions based on the provided documents.\n\
         Answer the user's question using only the information found in the context below.\n\
         If you cannot find the answer in the provided context, just say that you don't know.\n\
         \n",
    );

    if !history.is_empty() {
        prompt.push_str("Chat history:\n");
        for turn in history {
            prompt.push_str(&format!("{}: {}\n", turn.role, turn.content));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "Context:\n{context}\n\nQuestion: {question}\nAnswer:\n",
        context = context,
        question = question,
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    #[test]
    fn test_contains_question_and_passages_in_order() {
        let passages = vec!["First passage.", "Second passage\nwith a newline."];
        let prompt = compose_prompt("What is in the second passage?", &passages);

        assert!(prompt.contains("Question: What is in the second passage?"));
        assert!(prompt.contains("First passage.\n\nSecond passage\nwith a newline."));
        let first = prompt.find("First passage.").unwrap();
        let second = prompt.find("Second passage").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_grounding_instructions_present() {
        let prompt = compose_prompt("q", &["p".to_string()]);
        assert!(prompt.contains("using only the information found in the context"));
        assert!(prompt.contains("say that you don't know"));
    }

    #[test]
    fn test_verbatim_special_characters() {
        let passage = "{braces} and 100% \"quotes\"";
        let question = "Is {this} kept?";
        let prompt = compose_prompt(question, &[passage]);
        assert!(prompt.contains(passage));
        assert!(prompt.contains(question));
    }

    #[test]
    fn test_plain_prompt_has_no_history_section() {
        let prompt = compose_prompt("q", &["p"]);
        assert!(!prompt.contains("Chat history:"));
    }

    #[test]
    fn test_history_precedes_context() {
        let history = vec![
            ChatTurn {
                role: Role::User,
                content: "Who approved the dividend?".to_string(),
            },
            ChatTurn {
                role: Role::Assistant,
                content: "The board.".to_string(),
            },
        ];
        let prompt =
            compose_conversational_prompt(&history, "How much was it?", &["Two dollars per share."]);

        assert!(prompt.contains("Chat history:\nYou: Who approved the dividend?\nAI: The board.\n"));
        let history_at = prompt.find("Chat history:").unwrap();
        let context_at = prompt.find("Context:").unwrap();
        assert!(history_at < context_at);
        assert!(prompt.contains("Question: How much was it?"));
        assert!(prompt.contains("say that you don't know"));
    }
}
