use crate::config::Language;

/// Every user- and model-facing sentence of a review run, in one language.
#[derive(Debug, Clone, Copy)]
pub struct PromptTexts {
    language: Language,
}

impl PromptTexts {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    /// Reviewer persona sent as the system message.
    pub fn system_message(&self) -> &'static str {
        match self.language {
            Language::En => {
                "You are a code reviewer. Give advice on how to improve the code you are given. \
                 Do not introduce yourself and answer in English."
            }
            Language::Fr => {
                "Tu es un relecteur de code informatique, donne des conseils d'améliorations \
                 sur le code donné. Ne te présente pas et réponds en français"
            }
        }
    }

    pub fn instructions(&self, title: &str) -> String {
        match self.language {
            Language::En => format!(
                "The change has the following title: {title}.

Your task:
- Review the code changes and provide feedback
- If there are any bugs, highlight them
- Provide details on missed use of best-practices
- Does the code do what it says in the commit messages?
- Do not highlight minor issues and nitpicks
- Use bullet points if you have multiple comments
- Provide security recommendations if there are any

The changes (diffs) are given in unidiff format.
Do not answer yet. I will add a description of the changes in another message."
            ),
            Language::Fr => format!(
                "Le changement a le titre suivant: {title}.

Ta tâche:
- Fais une revue du code et donne une analyse
- S'il y a des bugs, mets les en valeur
- Donne des détails sur des oublis des meilleures pratiques
- Est-ce que le code fait ce qui est décrit dans les messages ?
- Ne donne pas d'informations sur les problèmes mineurs et pinailleries
- Utilise des listes à puces si tu as plusieurs commentaires à faire
- Donne des recommandations sur la sécurité si besoin

Les changements (diffs) sont donnés au format unidiff.
Ne donne pas ta réponse pour le moment. Je vais ajouter une description des changements dans un autre message."
            ),
        }
    }

    pub fn description(&self, description: &str) -> String {
        match self.language {
            Language::En => format!(
                "A description was given to help you understand why these changes were made.
The description is in Markdown format. Do not answer yet. I will add the code changes in a new message.

{description}"
            ),
            Language::Fr => format!(
                "Une description a été donnée pour t'aider à comprendre pourquoi ces changements ont été effectués.
La description a été faite au format Markdown. Ne donne pas encore ta réponse. Je vais ajouter les changements de code dans un nouveau message.

{description}"
            ),
        }
    }

    /// Appended to every diff block.
    pub fn hold_reply(&self) -> &'static str {
        match self.language {
            Language::En => "Do not answer yet. I will confirm once all the changes have been sent.",
            Language::Fr => {
                "Ne donne pas encore de réponse. Je vais confirmer quand tous les changements ont été envoyés."
            }
        }
    }

    pub fn all_sent(&self) -> &'static str {
        match self.language {
            Language::En => {
                "All code changes have been provided. Please provide your code review \
                 based on all the changes, the context and the title provided."
            }
            Language::Fr => {
                "Toutes les modifications de code ont été fournies. Merci de fournir ta revue \
                 de code, basée sur toutes les modifications, le contexte et le titre fournit."
            }
        }
    }

    /// Status shown while the non-final prompts are being sent.
    pub fn sending(&self, remaining: usize) -> String {
        match self.language {
            Language::En => {
                format!("Sending code... Prompts left to send: {remaining}. Please wait...")
            }
            Language::Fr => format!(
                "Envoi du code... Nombre de prompts à envoyer: {remaining}. Merci de patienter..."
            ),
        }
    }

    pub fn truncation_warning(&self, max_chars: usize) -> String {
        match self.language {
            Language::En => format!(
                "Some parts of the patch were truncated because they exceeded {max_chars} characters. \
                 The review might not be complete."
            ),
            Language::Fr => format!(
                "Certaines parties du patch ont été tronquées car elles dépassaient {max_chars} caractères. \
                 La revue pourrait ne pas être complète."
            ),
        }
    }

    pub fn missing_api_key(&self) -> &'static str {
        match self.language {
            Language::En => "Please add your OpenAI API key to the diffsage settings.",
            Language::Fr => "Merci d'ajouter votre clé d'API OpenAI aux paramètres de diffsage.",
        }
    }
}
