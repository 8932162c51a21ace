//! The ticket store: index, session pointers and every mutation.
//!
//! A [`Store`] is opened once per process. It keeps the decoded index of
//! the ticket branch, the session pointers used to resolve short
//! references, saved queries, and a snapshot cache so the next process can
//! skip decoding. Every mutation is one branch transaction with one commit,
//! followed by a full rebuild of the index and a snapshot write.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use crate::backend::git::GitCli;
use crate::backend::{Binding, CommitSummary, TreeStore};
use crate::cache::{LoadSource, Session, Snapshot, SnapshotCache};
use crate::codec::marker::ID_FILE;
use crate::codec::marker::check_component;
use crate::codec::{Index, Marker, TicketName, decode, hydrate};
use crate::config::{DEFAULT_BRANCH, EffectiveConfig, LocalPaths};
use crate::error::{Result, TixError};
use crate::model::ticket::{Attachment, Comment, Ticket, TicketState};
use crate::query::{QueryOptions, query};
use crate::settings::Settings;
use crate::txn::{TicketBranch, Workspace};

/// Author recorded when git has no `user.email`.
pub const ANONYMOUS: &str = "anon";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Root of per-repository local state (`~/.tix`).
    pub tix_dir: PathBuf,
    pub branch: String,
}

impl StoreOptions {
    pub fn new(tix_dir: impl Into<PathBuf>) -> Self {
        Self {
            tix_dir: tix_dir.into(),
            branch: DEFAULT_BRANCH.to_string(),
        }
    }

    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }
}

impl From<EffectiveConfig> for StoreOptions {
    fn from(config: EffectiveConfig) -> Self {
        Self {
            tix_dir: config.tix_dir,
            branch: config.branch,
        }
    }
}

/// Extra content for a new ticket.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub comment: Option<String>,
    /// Tag lists; each entry may itself be comma separated.
    pub tags: Vec<String>,
}

/// Result of [`Store::list`].
#[derive(Debug, Clone, Serialize)]
pub struct ListOutcome {
    pub tickets: Vec<Ticket>,
    /// Options after merging a saved query.
    pub options: QueryOptions,
    /// Name the options were saved under, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_as: Option<String>,
}

pub struct Store<S: TreeStore> {
    backend: S,
    branch: TicketBranch,
    paths: LocalPaths,
    cache: SnapshotCache,
    settings: Settings,
    identity: String,
    index: Index,
    tickets: Vec<Ticket>,
    branch_head: Option<String>,
    session: Session,
    load_source: LoadSource,
}

impl Store<GitCli> {
    /// Open the store for the git repository containing `start`.
    ///
    /// # Errors
    ///
    /// - [`TixError::RepoNotFound`] when no repository encloses `start`.
    /// - Backend or [`TixError::FormatCorruption`] errors from the initial load.
    pub fn open(start: &Path, options: StoreOptions) -> Result<Self> {
        let backend =
            GitCli::discover(start)?.ok_or_else(|| TixError::RepoNotFound(start.to_path_buf()))?;
        Self::with_backend(backend, options)
    }
}

impl<S: TreeStore> Store<S> {
    /// Open the store over an already located backend.
    ///
    /// Loads the snapshot when it is fresh; otherwise decodes the ticket
    /// branch and writes a new snapshot, keeping any session pointers the
    /// stale snapshot carried.
    ///
    /// # Errors
    ///
    /// Backend failures and [`TixError::FormatCorruption`].
    pub fn with_backend(backend: S, options: StoreOptions) -> Result<Self> {
        let paths = LocalPaths::for_repo(&options.tix_dir, backend.root());
        let identity = backend
            .config_value("user.email")?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| ANONYMOUS.to_string());
        let branch = TicketBranch::new(
            options.branch,
            Binding {
                index_file: paths.index_file.clone(),
                work_tree: paths.work_tree.clone(),
            },
        );

        let mut store = Self {
            settings: Settings::load(&paths.settings),
            cache: SnapshotCache::new(&paths.snapshot),
            backend,
            branch,
            paths,
            identity,
            index: Index::default(),
            tickets: Vec::new(),
            branch_head: None,
            session: Session::default(),
            load_source: LoadSource::Rebuilt,
        };
        store.load()?;
        Ok(store)
    }

    fn load(&mut self) -> Result<()> {
        let head = self.backend.branch_head(self.branch.name())?;
        match self.cache.load() {
            Some(snapshot) if snapshot.is_fresh(head.as_deref()) => {
                match hydrate(&snapshot.index) {
                    Ok(tickets) => {
                        tracing::debug!(
                            tickets = tickets.len(),
                            path = %self.cache.path().display(),
                            "loaded index from snapshot"
                        );
                        self.index = snapshot.index;
                        self.tickets = tickets;
                        self.branch_head = head;
                        self.session = snapshot.session;
                        self.load_source = LoadSource::Snapshot;
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::warn!("snapshot index does not decode, rebuilding: {e}");
                        self.session = snapshot.session;
                        self.load_source = LoadSource::StaleRebuilt;
                    }
                }
            }
            Some(snapshot) => {
                tracing::debug!(
                    path = %self.cache.path().display(),
                    "snapshot predates branch head, rebuilding index"
                );
                self.session = snapshot.session;
                self.load_source = LoadSource::StaleRebuilt;
            }
            None => self.load_source = LoadSource::Rebuilt,
        }
        self.rebuild()
    }

    /// Decode the whole ticket branch again and write a snapshot.
    ///
    /// # Errors
    ///
    /// Backend failures and [`TixError::FormatCorruption`].
    pub fn rebuild(&mut self) -> Result<()> {
        let head = self.backend.branch_head(self.branch.name())?;
        let index = if head.is_some() {
            decode(&self.backend.list_tree(self.branch.name())?)?
        } else {
            Index::default()
        };
        self.tickets = hydrate(&index)?;
        self.index = index;
        self.branch_head = head;
        tracing::debug!(tickets = self.tickets.len(), branch = self.branch.name(), "rebuilt ticket index");
        self.persist();
        Ok(())
    }

    fn persist(&self) {
        self.cache.store(&Snapshot::new(
            self.branch_head.clone(),
            self.index.clone(),
            self.session.clone(),
        ));
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[must_use]
    pub const fn backend(&self) -> &S {
        &self.backend
    }

    #[must_use]
    pub fn into_backend(self) -> S {
        self.backend
    }

    #[must_use]
    pub fn branch(&self) -> &str {
        self.branch.name()
    }

    #[must_use]
    pub const fn paths(&self) -> &LocalPaths {
        &self.paths
    }

    /// Email recorded as author and default assignee.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The identity, checked for use in a marker filename.
    fn author(&self) -> Result<String> {
        check_component("user.email", &self.identity)?;
        Ok(self.identity.clone())
    }

    #[must_use]
    pub const fn load_source(&self) -> LoadSource {
        self.load_source
    }

    #[must_use]
    pub const fn index(&self) -> &Index {
        &self.index
    }

    /// Every ticket, in index order.
    #[must_use]
    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    #[must_use]
    pub fn ticket(&self, name: &str) -> Option<&Ticket> {
        self.tickets.iter().find(|t| t.name == name)
    }

    #[must_use]
    pub fn current_ticket(&self) -> Option<&str> {
        self.session.current_ticket.as_deref()
    }

    /// Ticket names of the last listing, in display order.
    #[must_use]
    pub fn last_tickets(&self) -> &[String] {
        &self.session.last_tickets
    }

    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    // -----------------------------------------------------------------------
    // References
    // -----------------------------------------------------------------------

    /// Turn a user reference into a ticket name.
    ///
    /// - absent or empty: the checked-out ticket
    /// - all digits: 1-based position in the last listing
    /// - anything else: prefix of a ticket id, first match in index order
    #[must_use]
    pub fn resolve(&self, reference: Option<&str>) -> Option<String> {
        let Some(reference) = reference.map(str::trim).filter(|r| !r.is_empty()) else {
            return self
                .session
                .current_ticket
                .clone()
                .filter(|name| self.index.contains(name));
        };

        if reference.bytes().all(|b| b.is_ascii_digit()) {
            let position = reference.parse::<usize>().ok()?;
            return position
                .checked_sub(1)
                .and_then(|i| self.session.last_tickets.get(i))
                .filter(|name| self.index.contains(name))
                .cloned();
        }

        let mut matches = self.index.iter().map(|(name, _)| name).filter(|name| {
            self.index
                .ticket_id(name)
                .is_some_and(|id| id.as_str().starts_with(reference))
        });
        let first = matches.next()?;
        let others = matches.count();
        if others > 0 {
            tracing::warn!(
                reference,
                chosen = %first,
                others,
                "ambiguous ticket reference; using first match"
            );
        }
        Some(first.clone())
    }

    #[must_use]
    pub fn show(&self, reference: Option<&str>) -> Option<&Ticket> {
        self.resolve(reference).and_then(|name| self.ticket(&name))
    }

    /// Make the referenced ticket the default for later commands.
    pub fn checkout(&mut self, reference: Option<&str>) -> Option<String> {
        let name = self.resolve(reference)?;
        tracing::info!(ticket = %name, "checked out ticket");
        self.session.current_ticket = Some(name.clone());
        self.persist();
        Some(name)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Open a new ticket assigned to the current identity.
    ///
    /// # Errors
    ///
    /// [`TixError::InvalidTitle`] for a blank title; [`TixError::InvalidName`]
    /// when the identity cannot name a marker; transaction failures.
    pub fn create(&mut self, title: &str, options: CreateOptions) -> Result<Ticket> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TixError::InvalidTitle);
        }
        let author = self.author()?;

        let now = Utc::now().timestamp();
        let mut rng = rand::thread_rng();
        let name = loop {
            let candidate = TicketName::generate(title, now, &mut rng).to_string();
            if !self.index.contains(&candidate) {
                break candidate;
            }
        };

        let comment = options.comment.filter(|c| !c.trim().is_empty());
        let tags = parse_tags(options.tags.iter().map(String::as_str));
        let message = format!("added ticket {name}");

        self.commit_change(&name, &message, |ws, dir| {
            ws.write_file(dir.join(ID_FILE), format!("{name}\n"))?;
            ws.write_file(
                dir.join(Marker::Assigned(author.clone()).file_name()),
                format!("{author}\n"),
            )?;
            let open = TicketState::Open.as_str();
            ws.write_file(
                dir.join(Marker::State(open.to_string()).file_name()),
                format!("{open}\n"),
            )?;
            if let Some(body) = &comment {
                let marker = Marker::Comment {
                    added: now,
                    author: author.clone(),
                };
                ws.write_file(dir.join(marker.file_name()), body)?;
            }
            for tag in &tags {
                ws.write_file(dir.join(Marker::Tag(tag.clone()).file_name()), format!("{tag}\n"))?;
            }
            Ok(())
        })
    }

    /// Assign the ticket to `user`, or to the current identity.
    ///
    /// # Errors
    ///
    /// [`TixError::InvalidName`] when `user` cannot name a marker;
    /// transaction failures.
    pub fn assign(&mut self, reference: Option<&str>, user: Option<&str>) -> Result<Option<Ticket>> {
        let Some(name) = self.resolve(reference) else {
            return Ok(None);
        };
        let user = user
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(self.identity.as_str())
            .to_string();
        check_component("assignee", &user)?;
        let target = Marker::Assigned(user.clone()).file_name();
        let existing = self.marker_files(&name, |m| matches!(m, Marker::Assigned(_)));
        if existing == [target.as_str()] {
            tracing::debug!(ticket = %name, user, "already assigned");
            return Ok(self.ticket(&name).cloned());
        }

        let message = format!("assigned {user} to ticket {name}");
        self.commit_change(&name, &message, |ws, dir| {
            for file in existing.iter().filter(|f| **f != target) {
                ws.remove(dir.join(file))?;
            }
            ws.write_file(dir.join(&target), format!("{user}\n"))
        })
        .map(Some)
    }

    /// # Errors
    ///
    /// Transaction failures.
    pub fn change_state(
        &mut self,
        reference: Option<&str>,
        state: TicketState,
    ) -> Result<Option<Ticket>> {
        let Some(name) = self.resolve(reference) else {
            return Ok(None);
        };
        let target = Marker::State(state.as_str().to_string()).file_name();
        let existing = self.marker_files(&name, |m| matches!(m, Marker::State(_)));
        if existing == [target.as_str()] {
            tracing::debug!(ticket = %name, %state, "state unchanged");
            return Ok(self.ticket(&name).cloned());
        }

        let message = format!("changed state to {state} on ticket {name}");
        self.commit_change(&name, &message, |ws, dir| {
            for file in existing.iter().filter(|f| **f != target) {
                ws.remove(dir.join(file))?;
            }
            ws.write_file(dir.join(&target), format!("{state}\n"))
        })
        .map(Some)
    }

    /// Add each tag of the comma separated `tags` list.
    ///
    /// # Errors
    ///
    /// Transaction failures.
    pub fn add_tags(&mut self, reference: Option<&str>, tags: &str) -> Result<Option<Ticket>> {
        let Some(name) = self.resolve(reference) else {
            return Ok(None);
        };
        let Some(ticket) = self.ticket(&name) else {
            return Ok(None);
        };
        let added: Vec<String> = parse_tags([tags])
            .into_iter()
            .filter(|t| !ticket.has_tag(t))
            .collect();
        if added.is_empty() {
            tracing::debug!(ticket = %name, "no new tags");
            return Ok(Some(ticket.clone()));
        }

        let message = format!("added tags ({}) to ticket {name}", added.join(", "));
        self.commit_change(&name, &message, |ws, dir| {
            for tag in &added {
                ws.write_file(dir.join(Marker::Tag(tag.clone()).file_name()), format!("{tag}\n"))?;
            }
            Ok(())
        })
        .map(Some)
    }

    /// Remove each tag of the comma separated `tags` list.
    ///
    /// # Errors
    ///
    /// Transaction failures.
    pub fn remove_tags(&mut self, reference: Option<&str>, tags: &str) -> Result<Option<Ticket>> {
        let Some(name) = self.resolve(reference) else {
            return Ok(None);
        };
        let doomed = parse_tags([tags]);
        let files = self.marker_files(&name, |m| matches!(m, Marker::Tag(t) if doomed.contains(t)));
        if files.is_empty() {
            tracing::debug!(ticket = %name, "no tags to remove");
            return Ok(self.ticket(&name).cloned());
        }

        let removed: Vec<&str> = doomed.iter().map(String::as_str).collect();
        let message = format!("removed tags ({}) from ticket {name}", removed.join(", "));
        self.commit_change(&name, &message, |ws, dir| {
            for file in &files {
                ws.remove(dir.join(file))?;
            }
            Ok(())
        })
        .map(Some)
    }

    /// Add a comment by the current identity. Blank bodies are ignored.
    ///
    /// # Errors
    ///
    /// [`TixError::InvalidName`] when the identity cannot name a marker;
    /// transaction failures.
    pub fn add_comment(&mut self, reference: Option<&str>, body: &str) -> Result<Option<Ticket>> {
        let Some(name) = self.resolve(reference) else {
            return Ok(None);
        };
        if body.trim().is_empty() {
            tracing::debug!(ticket = %name, "ignoring empty comment");
            return Ok(self.ticket(&name).cloned());
        }

        let marker = Marker::Comment {
            added: Utc::now().timestamp(),
            author: self.author()?,
        };
        let message = format!("added comment to ticket {name}");
        self.commit_change(&name, &message, |ws, dir| {
            ws.write_file(dir.join(marker.file_name()), body)
        })
        .map(Some)
    }

    /// Attach a copy of the file at `path`.
    ///
    /// # Errors
    ///
    /// [`TixError::Io`] when `path` is not a readable file; transaction failures.
    pub fn add_attachment(&mut self, reference: Option<&str>, path: &Path) -> Result<Option<Ticket>> {
        let Some(name) = self.resolve(reference) else {
            return Ok(None);
        };
        let metadata = fs::metadata(path).map_err(|e| TixError::io(path, e))?;
        let filename = match path.file_name() {
            Some(f) if metadata.is_file() => f.to_string_lossy().into_owned(),
            _ => {
                return Err(TixError::io(
                    path,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
                ));
            }
        };

        let marker = Marker::Attachment {
            added: Utc::now().timestamp(),
            author: self.author()?,
            filename,
        };
        let message = format!("added attachment to ticket {name}");
        self.commit_change(&name, &message, |ws, dir| {
            ws.copy_in(path, dir.join(marker.file_name()))
        })
        .map(Some)
    }

    fn commit_change(
        &mut self,
        name: &str,
        message: &str,
        op: impl FnOnce(&Workspace<'_, S>, &Path) -> Result<()>,
    ) -> Result<Ticket> {
        self.branch.run(&self.backend, |ws| {
            op(ws, Path::new(name))?;
            ws.stage_all()?;
            ws.commit(message)
        })?;
        tracing::info!(ticket = name, "{message}");
        self.rebuild()?;
        self.ticket(name)
            .cloned()
            .ok_or_else(|| TixError::corrupt(name, "ticket missing after commit"))
    }

    /// Marker files of `name` whose parsed marker satisfies `keep`.
    fn marker_files(&self, name: &str, keep: impl Fn(&Marker) -> bool) -> Vec<String> {
        self.index
            .bucket(name)
            .into_iter()
            .flatten()
            .filter(|e| Marker::parse(&e.file).is_ok_and(|m| keep(&m)))
            .map(|e| e.file.clone())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// List tickets, optionally replaying and/or saving a named query.
    ///
    /// Records the result order so numeric references resolve against it.
    ///
    /// # Errors
    ///
    /// [`TixError::InvalidPattern`]; [`TixError::Io`] when saving settings fails.
    pub fn list(&mut self, options: QueryOptions) -> Result<ListOutcome> {
        let options = match options.saved.as_deref() {
            Some(saved) => match self.settings.saved(saved) {
                Some(stored) => options.clone().merged_under(stored),
                None => {
                    tracing::warn!(saved, "no saved query with that name");
                    options
                }
            },
            None => options,
        };

        let tickets: Vec<Ticket> = query(&self.tickets, &options)?
            .into_iter()
            .cloned()
            .collect();

        let saved_as = options.save.clone();
        if let Some(save) = &saved_as {
            self.settings
                .list_options
                .insert(save.clone(), options.without_directives());
            self.settings.save(&self.paths.settings)?;
            tracing::info!(name = %save, "saved list query");
        }

        self.session.last_tickets = tickets.iter().map(|t| t.name.clone()).collect();
        self.persist();

        Ok(ListOutcome {
            tickets,
            options: options.without_directives(),
            saved_as,
        })
    }

    /// Commits on the ticket branch, newest first, optionally only those
    /// touching one ticket.
    ///
    /// # Errors
    ///
    /// Backend failures.
    pub fn recent(&self, ticket: Option<&str>) -> Result<Vec<CommitSummary>> {
        if !self.backend.branch_exists(self.branch.name())? {
            return Ok(Vec::new());
        }
        Ok(self.backend.history(self.branch.name(), ticket)?)
    }

    /// # Errors
    ///
    /// Backend failures.
    pub fn comment_body(&self, comment: &Comment) -> Result<String> {
        let raw = self.backend.read_blob(&comment.body)?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// # Errors
    ///
    /// Backend failures.
    pub fn attachment_content(&self, attachment: &Attachment) -> Result<Vec<u8>> {
        Ok(self.backend.read_blob(&attachment.content)?)
    }
}

/// Normalized tags of comma separated lists, blanks dropped.
fn parse_tags<'a>(lists: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    lists
        .into_iter()
        .flat_map(|list| list.split(','))
        .filter_map(|text| match Marker::tag(text) {
            Some(Marker::Tag(tag)) => Some(tag),
            _ => None,
        })
        .collect()
}
