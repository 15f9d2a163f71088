//! Resolution pipeline: question in, dialog or answer out.
//!
//! `ask` runs the stages once per question:
//!
//! ```text
//! parse tree -> filters -> POCs + focus -> annotations -> pre-consolidation
//!            -> overlap groups -> consolidation -> dialog | answer
//! ```
//!
//! A dialog parks the query in the session store; `vote` applies the user's
//! choice, updates the reward model and continues with the next dialog or
//! the answer. The session is cleared once an answer is produced.

use std::fmt;

use crate::builder::add_semantic_concepts;
use crate::config::EngineConfig;
use crate::consolidator::Consolidator;
use crate::dialog::learning::{LearningStore, update_learning_model, update_vote_scores};
use crate::dialog::{DialogHandler, DialogOutput, apply_choice};
use crate::error::{ConceptError, ConceptResult, QueryError, SessionError};
use crate::mapper::Mapper;
use crate::model::Query;
use crate::nlp::filter::extract_filters;
use crate::nlp::poc::annotate_focus;
use crate::nlp::tree::ParseTree;
use crate::ontology::{KnowledgeBase, SynonymSource};
use crate::query::{self, UNRESOLVED};
use crate::session::{SessionContext, SessionStore};

/// What the user sees after a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The question needs a choice first.
    Dialog(DialogOutput),
    Answer(String),
    /// The request failed; the session was reset.
    Failed(String),
}

impl Outcome {
    pub fn dialog(&self) -> Option<&DialogOutput> {
        match self {
            Self::Dialog(dialog) => Some(dialog),
            _ => None,
        }
    }

    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Answer(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dialog(dialog) => write!(f, "{dialog}"),
            Self::Answer(text) => writeln!(f, "{text}"),
            Self::Failed(message) => writeln!(f, "{message}"),
        }
    }
}

/// A request against one session.
#[derive(Debug, Clone)]
pub enum Request {
    /// Bracketed parse tree of a question.
    Ask(String),
    /// Id of a vote of the pending dialog.
    Vote(String),
}

pub struct Resolver<'a> {
    kb: &'a dyn KnowledgeBase,
    synonyms: &'a dyn SynonymSource,
    config: &'a EngineConfig,
    sessions: &'a dyn SessionStore,
    learning: Option<&'a LearningStore>,
    user_labels: Vec<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        kb: &'a dyn KnowledgeBase,
        synonyms: &'a dyn SynonymSource,
        config: &'a EngineConfig,
        sessions: &'a dyn SessionStore,
    ) -> Self {
        Self {
            kb,
            synonyms,
            config,
            sessions,
            learning: None,
            user_labels: Vec::new(),
        }
    }

    pub fn with_learning(mut self, store: &'a LearningStore) -> Self {
        self.learning = Some(store);
        self
    }

    /// Personalization labels; phrases matching one become literal candidates.
    pub fn with_user_labels(mut self, labels: Vec<String>) -> Self {
        self.user_labels = labels;
        self
    }

    fn dialogs(&self) -> DialogHandler<'a> {
        let handler = DialogHandler::new(self.kb, self.synonyms, self.config);
        match self.learning {
            Some(store) => handler.with_store(store),
            None => handler,
        }
    }

    /// Run the stages up to the point where a dialog or the answer is due.
    pub fn prepare(&self, tree: ParseTree) -> ConceptResult<Query> {
        let mut query = Query::new(tree);
        query.user_labels = self.user_labels.clone();
        query.filters = extract_filters(&query.tree, self.config.query.similarity_tolerance);
        annotate_focus(&mut query)?;

        Mapper::new(self.kb, self.synonyms).annotate(&mut query);
        let consolidator = Consolidator::new(self.kb);
        consolidator.pre_consolidate(&mut query);
        add_semantic_concepts(&mut query);
        consolidator.consolidate(&mut query);
        tracing::debug!(
            filters = query.filters.len(),
            groups = query.semantic_concepts.len(),
            pocs = query.pocs.len(),
            "question prepared"
        );
        Ok(query)
    }

    /// Start resolving a question; any pending dialog of the session is dropped.
    pub fn ask(&self, session: &str, tree: &str) -> ConceptResult<Outcome> {
        let tree = ParseTree::parse(tree)?;
        tracing::info!(session, question = %tree.text(), "question received");
        let query = self.prepare(tree)?;
        self.proceed(session, query)
    }

    /// Answer the pending dialog of a session.
    pub fn vote(&self, session: &str, vote_id: &str) -> ConceptResult<Outcome> {
        let no_dialog = || SessionError::NoPendingDialog {
            session: session.to_string(),
        };
        let context = self.sessions.get(session)?.ok_or_else(no_dialog)?;
        let SessionContext { mut query, pair } = context;
        let mut pair = pair.ok_or_else(no_dialog)?;

        let chosen = update_vote_scores(&mut pair, vote_id, &self.config.learning);
        let Some(choice) = chosen.first() else {
            return Err(SessionError::UnknownVote {
                vote: vote_id.to_string(),
            }
            .into());
        };
        tracing::info!(session, text = %pair.key.text, choice = %choice.candidate.element.print_uri(), "vote received");

        if self.config.learning.enabled
            && let Some(store) = self.learning
        {
            update_learning_model(store, self.kb, &pair);
        }
        apply_choice(&mut query, &pair, choice);
        self.proceed(session, query)
    }

    /// Open the next dialog or compute the answer.
    fn proceed(&self, session: &str, query: Query) -> ConceptResult<Outcome> {
        let dialogs = self.dialogs();
        if let Some(pair) = dialogs.generate_dialog(&query) {
            let output = dialogs.format(&pair);
            let context = SessionContext {
                query,
                pair: Some(pair),
            };
            self.sessions.set(session, &context)?;
            return Ok(Outcome::Dialog(output));
        }
        let answer = self.compute_answer(&query);
        self.sessions.clear(session)?;
        Ok(Outcome::Answer(answer))
    }

    /// Synthesize, execute and render; any failure yields the generic message.
    pub fn compute_answer(&self, query: &Query) -> String {
        let result = query::synthesize(query, self.kb, self.config)
            .and_then(|formal| query::answer(query, self.kb, &formal));
        match result {
            Ok(text) => text,
            Err(QueryError::Empty) => {
                tracing::info!("nothing to query");
                UNRESOLVED.to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, "answer could not be computed");
                UNRESOLVED.to_string()
            }
        }
    }

    /// Serve a request, turning errors into a message.
    ///
    /// Unknown vote ids leave the pending dialog in place; every other
    /// failure clears the session.
    pub fn respond(&self, session: &str, request: Request) -> Outcome {
        let result = match &request {
            Request::Ask(tree) => self.ask(session, tree),
            Request::Vote(id) => self.vote(session, id),
        };
        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                let keep = matches!(
                    e,
                    ConceptError::Session(SessionError::UnknownVote { .. } | SessionError::NoPendingDialog { .. })
                );
                if !keep && let Err(clear) = self.sessions.clear(session) {
                    tracing::warn!(error = %clear, session, "session could not be cleared");
                }
                tracing::warn!(error = %e, session, "request failed");
                Outcome::Failed(format!("{UNRESOLVED}: {e}"))
            }
        }
    }
}
