//! Flat-to-hierarchical reconciliation.
//!
//! # Design
//! - The feed is depth-first without parent pointers. The engine keeps one stack of
//!   [`ContainerFrame`]s; the only signal that the feed has moved back up the tree is that the
//!   next descriptor's container path no longer matches the top frame, so frames are popped
//!   until it does.
//! - One [`Reconciler`] owns every piece of traversal state (frames, naming, outcomes) for a
//!   single job. Nothing is shared across jobs.
//! - Per-item failures become outcomes and the traversal continues. An unparseable
//!   descriptor, a missing parent, or a non-conflict folder failure halts it.
//! - A folder whose name is taken by a container the sink cannot locate is an unresolved
//!   frame: it fails along with everything below it, while its siblings carry on.

use tracing::{debug, info, warn};

use crate::descriptor::{
    ACCESS_MARKER, CITATION_ACCESS_MARKER, ContentDescriptor, ContentKind, container_path,
};
use crate::error::SinkError;
use crate::names::NameRegistry;
use crate::sink::{FileMetadata, Sink, SinkHandle};
use crate::source::ContentSource;
use crate::status::{
    ItemOutcome, ItemStatus, MigrationStatusPayload, aggregate, describe_error,
};

/// One stack entry: a source container and its destination handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerFrame {
    /// Source path of the container, ending with `/`.
    pub source_path: String,
    /// Destination handle for the same container; `None` when it exists but was not found.
    pub handle: Option<SinkHandle>,
}

/// Where the next item lands.
enum Parent {
    Ready(SinkHandle),
    Unresolved,
    Missing,
}

/// Whether the traversal may continue after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepFlow {
    /// Process the next descriptor.
    Continue,
    /// Stop; the remaining descriptors cannot be placed safely.
    Halt,
}

/// Everything a finished traversal produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalReport {
    /// Outcomes in feed order, root excluded.
    pub outcomes: Vec<ItemOutcome>,
    /// Why the traversal stopped early, if it did.
    pub halt: Option<String>,
}

impl TraversalReport {
    /// Fold the report into the final status payload.
    #[must_use]
    pub fn into_payload(self) -> MigrationStatusPayload<ItemOutcome> {
        aggregate(self.outcomes, self.halt)
    }
}

/// Single-job traversal driving one sink.
pub struct Reconciler<'a> {
    sink: &'a mut dyn Sink,
    source: &'a dyn ContentSource,
    names: NameRegistry,
    frames: Vec<ContainerFrame>,
    root_path: Option<String>,
    outcomes: Vec<ItemOutcome>,
    halt: Option<String>,
}

impl<'a> Reconciler<'a> {
    /// Fresh traversal writing to `sink` and fetching bytes from `source`.
    pub fn new(sink: &'a mut dyn Sink, source: &'a dyn ContentSource) -> Self {
        let names = NameRegistry::new(sink.name_policy());
        Self {
            sink,
            source,
            names,
            frames: Vec::new(),
            root_path: None,
            outcomes: Vec::new(),
            halt: None,
        }
    }

    /// Current stack depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Frame on top of the stack.
    #[must_use]
    pub fn top(&self) -> Option<&ContainerFrame> {
        self.frames.last()
    }

    /// Outcomes recorded so far.
    #[must_use]
    pub fn outcomes(&self) -> &[ItemOutcome] {
        &self.outcomes
    }

    /// Naming state accumulated so far.
    #[must_use]
    pub const fn names(&self) -> &NameRegistry {
        &self.names
    }

    /// Process every descriptor in order, stopping at the first halt.
    pub async fn run(mut self, descriptors: &[ContentDescriptor]) -> TraversalReport {
        for descriptor in descriptors {
            if self.step(descriptor).await == StepFlow::Halt {
                break;
            }
        }
        self.finish()
    }

    /// Consume the traversal, returning its report.
    #[must_use]
    pub fn finish(self) -> TraversalReport {
        TraversalReport {
            outcomes: self.outcomes,
            halt: self.halt,
        }
    }

    /// Process one descriptor.
    pub async fn step(&mut self, descriptor: &ContentDescriptor) -> StepFlow {
        if self.halt.is_some() {
            return StepFlow::Halt;
        }
        let title = descriptor.title.as_str();
        let Some(source_path) = descriptor.source_path.as_deref() else {
            let detail = format!(
                "Content url {} does not contain {ACCESS_MARKER} nor {CITATION_ACCESS_MARKER}",
                descriptor.access_url
            );
            return self.fail_and_halt(None, title, detail);
        };
        if source_path.is_empty() {
            self.outcomes.push(ItemOutcome::failure(
                None,
                title,
                &format!("No url for content {title}"),
            ));
            return StepFlow::Continue;
        }
        let container = container_path(source_path);
        if container.is_empty() {
            self.outcomes.push(ItemOutcome::failure(
                Some(source_path),
                title,
                &format!("No container folder url for content {title}"),
            ));
            return StepFlow::Continue;
        }

        match descriptor.kind {
            ContentKind::Folder if self.root_path.is_none() => {
                debug!(source_path = %source_path, "migration root established");
                self.root_path = Some(source_path.to_string());
                self.frames.push(ContainerFrame {
                    source_path: source_path.to_string(),
                    handle: Some(self.sink.root()),
                });
                StepFlow::Continue
            }
            ContentKind::Folder => self.enter_folder(descriptor, source_path, &container).await,
            ContentKind::File | ContentKind::Link => {
                self.put_item(descriptor, source_path, &container).await
            }
        }
    }

    fn ascend_to(&mut self, container: &str) -> Parent {
        while let Some(top) = self.frames.last() {
            if top.source_path == container {
                return match &top.handle {
                    Some(handle) => Parent::Ready(handle.clone()),
                    None => Parent::Unresolved,
                };
            }
            self.frames.pop();
        }
        Parent::Missing
    }

    fn relative<'p>(&self, source_path: &'p str) -> &'p str {
        self.root_path
            .as_deref()
            .and_then(|root| source_path.strip_prefix(root))
            .unwrap_or(source_path)
    }

    fn fail_and_halt(&mut self, source_path: Option<&str>, title: &str, detail: String) -> StepFlow {
        warn!(title = %title, detail = %detail, "migration halted");
        self.outcomes
            .push(ItemOutcome::failure(source_path, title, &detail));
        self.halt = Some(detail);
        StepFlow::Halt
    }

    async fn enter_folder(
        &mut self,
        descriptor: &ContentDescriptor,
        source_path: &str,
        container: &str,
    ) -> StepFlow {
        let title = descriptor.title.as_str();
        let parent = match self.ascend_to(container) {
            Parent::Ready(parent) => parent,
            Parent::Unresolved => {
                self.frames.push(ContainerFrame {
                    source_path: source_path.to_string(),
                    handle: None,
                });
                self.outcomes.push(ItemOutcome::failure(
                    Some(source_path),
                    title,
                    &format!("Cannot find parent folder for folder {title}"),
                ));
                return StepFlow::Continue;
            }
            Parent::Missing => {
                let detail = format!("Cannot find parent folder for folder {title}");
                return self.fail_and_halt(Some(source_path), title, detail);
            }
        };

        let proposed = self.names.sanitize(ContentKind::Folder, title);
        let name = self.names.claim(&parent, ContentKind::Folder, &proposed);
        if name != title {
            let suffix = self.relative(source_path).to_string();
            self.names.record_rename(&suffix, &name);
        }

        let label = self.sink.label();
        match self
            .sink
            .create_folder(&parent, &name, descriptor.description.as_deref())
            .await
        {
            Ok(handle) => {
                info!(
                    source_path = %source_path,
                    destination = %self.names.rewrite(self.relative(source_path)),
                    "folder created"
                );
                self.frames.push(ContainerFrame {
                    source_path: source_path.to_string(),
                    handle: Some(handle),
                });
                self.outcomes.push(ItemOutcome::success(
                    Some(source_path),
                    title,
                    format!("folder {name} created."),
                ));
                StepFlow::Continue
            }
            Err(SinkError::Conflict { existing, .. }) => {
                info!(source_path = %source_path, existing = %existing, "folder already exists; reusing it");
                self.frames.push(ContainerFrame {
                    source_path: source_path.to_string(),
                    handle: Some(existing),
                });
                self.outcomes.push(ItemOutcome::success(
                    Some(source_path),
                    title,
                    format!("There is already a folder with name {name} - folder was not created in {label}"),
                ));
                StepFlow::Continue
            }
            Err(SinkError::UnresolvedConflict { detail, .. }) => {
                warn!(source_path = %source_path, detail = %detail, "existing folder not found; skipping its content");
                self.frames.push(ContainerFrame {
                    source_path: source_path.to_string(),
                    handle: None,
                });
                self.outcomes.push(ItemOutcome::failure(
                    Some(source_path),
                    title,
                    &format!(
                        "There is already a folder with name {name} in {label} but it could not be found - \
                         folder and its content were not migrated: {detail}"
                    ),
                ));
                StepFlow::Continue
            }
            Err(err) => {
                let detail = format!(
                    "Problem creating folder {name} in {label}; the migration process was stopped. \
                     Please rename the folder/resource item and migrate site again: {}",
                    describe_error(&err)
                );
                self.fail_and_halt(Some(source_path), title, detail)
            }
        }
    }

    async fn put_item(
        &mut self,
        descriptor: &ContentDescriptor,
        source_path: &str,
        container: &str,
    ) -> StepFlow {
        let title = descriptor.title.as_str();
        let parent = match self.ascend_to(container) {
            Parent::Ready(parent) => parent,
            Parent::Unresolved => {
                self.outcomes.push(ItemOutcome::failure(
                    Some(source_path),
                    title,
                    &format!("Cannot find parent folder for file {title}"),
                ));
                return StepFlow::Continue;
            }
            Parent::Missing => {
                let detail = format!("Cannot find parent folder for file {title}");
                return self.fail_and_halt(Some(source_path), title, detail);
            }
        };

        let label = self.sink.label();
        if descriptor.kind == ContentKind::File
            && let Some(limit) = self.sink.max_object_size()
            && descriptor.size >= limit
        {
            self.outcomes.push(ItemOutcome::failure(
                Some(source_path),
                title,
                &format!(
                    "{title} is of size {}, too big to be uploaded to {label}",
                    descriptor.size
                ),
            ));
            return StepFlow::Continue;
        }

        let proposed = self.names.sanitize(descriptor.kind, title);
        let name = self.names.claim(&parent, descriptor.kind, &proposed);
        debug!(
            source_path = %source_path,
            destination = %self.names.rewrite(&container_path(self.relative(source_path))),
            name = %name,
            "writing item"
        );

        let status = match descriptor.kind {
            ContentKind::Link => {
                self.sink
                    .put_link(&parent, &name, title, descriptor.link_target())
                    .await
            }
            _ => match self.source.fetch(&descriptor.fetch_url()).await {
                Ok(content) => {
                    let metadata = FileMetadata {
                        size: descriptor.size,
                        description: descriptor.description.clone(),
                        author: descriptor.author.clone(),
                        sensitive: descriptor.sensitive,
                    };
                    self.sink.put_file(&parent, &name, content, &metadata).await
                }
                Err(err) => {
                    warn!(source_path = %source_path, error = %err, "content fetch failed");
                    ItemStatus::failed(format!(
                        "Cannot fetch content {title}: {}",
                        describe_error(&err)
                    ))
                }
            },
        };
        self.outcomes
            .push(ItemOutcome::from_status(Some(source_path), title, status));
        StepFlow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentStream, content_from_bytes};
    use crate::error::{SinkResult, SourceError, SourceResult};
    use crate::names::NamePolicy;
    use crate::status::{MigrationStatus, Outcome};
    use async_trait::async_trait;

    #[derive(Default)]
    struct StubSink {
        next_id: u32,
        conflict_on: Option<&'static str>,
        unresolved_on: Option<&'static str>,
        fail_on: Option<&'static str>,
        files: Vec<(String, String)>,
        max: Option<u64>,
    }

    #[async_trait]
    impl Sink for StubSink {
        fn label(&self) -> &'static str {
            "stub"
        }

        fn root(&self) -> SinkHandle {
            SinkHandle::new("root")
        }

        fn name_policy(&self) -> NamePolicy {
            NamePolicy::ARCHIVE
        }

        fn max_object_size(&self) -> Option<u64> {
            self.max
        }

        async fn create_folder(
            &mut self,
            _parent: &SinkHandle,
            name: &str,
            _description: Option<&str>,
        ) -> SinkResult<SinkHandle> {
            if self.conflict_on == Some(name) {
                return Err(SinkError::Conflict {
                    name: name.to_string(),
                    existing: SinkHandle::new("existing"),
                });
            }
            if self.unresolved_on == Some(name) {
                return Err(SinkError::UnresolvedConflict {
                    name: name.to_string(),
                    detail: format!("no folder named {name} in listing"),
                });
            }
            if self.fail_on == Some(name) {
                return Err(SinkError::backend("create_folder", "denied"));
            }
            self.next_id += 1;
            Ok(SinkHandle::new(format!("f{}", self.next_id)))
        }

        async fn put_file(
            &mut self,
            parent: &SinkHandle,
            name: &str,
            _content: ContentStream,
            _metadata: &FileMetadata,
        ) -> ItemStatus {
            self.files.push((parent.to_string(), name.to_string()));
            ItemStatus::ok("")
        }
    }

    struct StubSource;

    #[async_trait]
    impl ContentSource for StubSource {
        async fn fetch(&self, access_url: &str) -> SourceResult<ContentStream> {
            if access_url.ends_with("missing") {
                return Err(SourceError::Status {
                    operation: "fetch",
                    url: access_url.to_string(),
                    status: 404,
                });
            }
            Ok(content_from_bytes("bytes"))
        }
    }

    fn node(kind: ContentKind, title: &str, path: &str) -> ContentDescriptor {
        let access_url = format!("https://lms.test/access/content{path}");
        ContentDescriptor {
            kind,
            mime_type: None,
            title: title.to_string(),
            source_path: Some(path.to_string()),
            access_url,
            size: 10,
            description: None,
            author: None,
            sensitive: false,
            link_target: None,
        }
    }

    #[tokio::test]
    async fn depth_follows_the_feed() {
        let feed = [
            node(ContentKind::Folder, "Root", "/group/s/"),
            node(ContentKind::Folder, "A", "/group/s/A/"),
            node(ContentKind::File, "x.txt", "/group/s/A/x.txt"),
            node(ContentKind::File, "y.txt", "/group/s/y.txt"),
        ];
        let mut sink = StubSink::default();
        let source = StubSource;
        let mut reconciler = Reconciler::new(&mut sink, &source);
        let mut depths = Vec::new();
        for descriptor in &feed {
            assert_eq!(reconciler.step(descriptor).await, StepFlow::Continue);
            depths.push(reconciler.depth());
        }
        assert_eq!(depths, vec![1, 2, 2, 1]);
        let report = reconciler.finish();
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(sink.files, vec![
            ("f1".to_string(), "x.txt".to_string()),
            ("root".to_string(), "y.txt".to_string()),
        ]);
    }

    #[tokio::test]
    async fn conflict_reuses_existing_handle() {
        let feed = [
            node(ContentKind::Folder, "Root", "/group/s/"),
            node(ContentKind::Folder, "A", "/group/s/A/"),
            node(ContentKind::File, "x.txt", "/group/s/A/x.txt"),
        ];
        let mut sink = StubSink {
            conflict_on: Some("A"),
            ..StubSink::default()
        };
        let report = Reconciler::new(&mut sink, &StubSource).run(&feed).await;
        assert!(report.halt.is_none());
        assert!(report.outcomes[0].status_text.starts_with("There is already a folder"));
        assert_eq!(sink.files, vec![("existing".to_string(), "x.txt".to_string())]);
        assert_eq!(report.into_payload().status, MigrationStatus::Success);
    }

    #[tokio::test]
    async fn backend_error_halts_traversal() {
        let feed = [
            node(ContentKind::Folder, "Root", "/group/s/"),
            node(ContentKind::Folder, "A", "/group/s/A/"),
            node(ContentKind::File, "x.txt", "/group/s/A/x.txt"),
        ];
        let mut sink = StubSink {
            fail_on: Some("A"),
            ..StubSink::default()
        };
        let report = Reconciler::new(&mut sink, &StubSource).run(&feed).await;
        assert_eq!(report.outcomes.len(), 1);
        assert!(report.outcomes[0].is_failure());
        assert!(report.outcomes[0].status_text.contains("denied"));
        assert!(report.halt.as_deref().is_some_and(|halt| halt.contains("denied")));
        assert!(sink.files.is_empty());
    }

    #[tokio::test]
    async fn unlocated_existing_folder_skips_only_its_subtree() {
        let feed = [
            node(ContentKind::Folder, "Root", "/group/s/"),
            node(ContentKind::Folder, "A", "/group/s/A/"),
            node(ContentKind::File, "x.txt", "/group/s/A/x.txt"),
            node(ContentKind::Folder, "B", "/group/s/A/B/"),
            node(ContentKind::File, "z.txt", "/group/s/A/B/z.txt"),
            node(ContentKind::File, "y.txt", "/group/s/y.txt"),
        ];
        let mut sink = StubSink {
            unresolved_on: Some("A"),
            ..StubSink::default()
        };
        let report = Reconciler::new(&mut sink, &StubSource).run(&feed).await;
        assert!(report.halt.is_none());
        assert_eq!(report.outcomes.len(), 5);
        assert!(report.outcomes[0].status_text.contains("no folder named A in listing"));
        for outcome in &report.outcomes[..4] {
            assert!(outcome.is_failure(), "{}", outcome.status_text);
        }
        assert!(report.outcomes[2].status_text.contains("Cannot find parent folder for folder B"));
        assert!(!report.outcomes[4].is_failure());
        assert_eq!(sink.files, vec![("root".to_string(), "y.txt".to_string())]);
        assert_eq!(report.into_payload().status, MigrationStatus::Failure);
    }

    #[tokio::test]
    async fn unparseable_descriptor_halts() {
        let mut broken = node(ContentKind::File, "b", "/group/s/b");
        broken.source_path = None;
        broken.access_url = "https://lms.test/elsewhere/b".into();
        let feed = [
            node(ContentKind::Folder, "Root", "/group/s/"),
            broken,
            node(ContentKind::File, "c", "/group/s/c"),
        ];
        let mut sink = StubSink::default();
        let report = Reconciler::new(&mut sink, &StubSource).run(&feed).await;
        assert_eq!(report.outcomes.len(), 1);
        assert!(report.outcomes[0].status_text.contains("does not contain /access/content"));
        assert_eq!(report.into_payload().status, MigrationStatus::Failure);
    }

    #[tokio::test]
    async fn oversized_and_unfetchable_files_are_per_item() {
        let mut big = node(ContentKind::File, "big.iso", "/group/s/big.iso");
        big.size = 100;
        let feed = [
            node(ContentKind::Folder, "Root", "/group/s/"),
            big,
            node(ContentKind::File, "gone", "/group/s/missing"),
            node(ContentKind::File, "ok.txt", "/group/s/ok.txt"),
        ];
        let mut sink = StubSink {
            max: Some(100),
            ..StubSink::default()
        };
        let report = Reconciler::new(&mut sink, &StubSource).run(&feed).await;
        assert!(report.halt.is_none());
        assert_eq!(report.outcomes.len(), 3);
        assert!(report.outcomes[0].status_text.contains("too big to be uploaded to stub"));
        assert!(report.outcomes[1].status_text.starts_with("failure: Cannot fetch content gone"));
        assert_eq!(sink.files, vec![("root".to_string(), "ok.txt".to_string())]);
    }

    #[tokio::test]
    async fn invalid_link_is_a_per_item_failure() {
        let mut link = node(ContentKind::Link, "not a url", "/group/s/l");
        link.link_target = None;
        let feed = [node(ContentKind::Folder, "Root", "/group/s/"), link];
        let mut sink = StubSink::default();
        let report = Reconciler::new(&mut sink, &StubSource).run(&feed).await;
        assert!(report.outcomes[0].status_text.contains("could not be migrated"));
        assert!(sink.files.is_empty());
    }

    #[tokio::test]
    async fn renamed_folders_are_recorded() {
        let feed = [
            node(ContentKind::Folder, "Root", "/group/s/"),
            node(ContentKind::Folder, "a:b", "/group/s/a:b/"),
            node(ContentKind::Folder, "A:B", "/group/s/A:B/"),
        ];
        let mut sink = StubSink::default();
        let source = StubSource;
        let mut reconciler = Reconciler::new(&mut sink, &source);
        for descriptor in &feed {
            reconciler.step(descriptor).await;
        }
        assert_eq!(reconciler.names().resolve("a:b/"), Some("a_b/"));
        assert_eq!(reconciler.names().resolve("A:B/"), Some("A_B (2)/"));
    }
}
