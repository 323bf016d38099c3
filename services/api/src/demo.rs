use crate::infra::{collaborators, InMemorySubmissionInbox, InMemoryUploadStore};
use clap::{Args, ValueEnum};
use member_intake::error::AppError;
use member_intake::workflows::intake::{
    word_count, ContinueOutcome, FileBlob, FlowBlueprint, FlowKind, IntakeSession, RecordEdit,
    ScrollGeometry, Specialization, SubjectId, UploadSlot,
};
use std::path::{Path, PathBuf};

const DEMO_MOTIVATION: &str = "I have spent the last six years working in community health \
    laboratories, first as a technician and later coordinating sample logistics for regional \
    screening programmes. Joining the society would connect me with peers who share that \
    practical focus, give me a place to present our open protocols, and help me mentor the \
    students who rotate through our lab every spring. I also want to contribute to the working \
    group on reproducible assay documentation.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub(crate) enum DemoFlow {
    #[default]
    Member,
    Event,
}

impl DemoFlow {
    fn kind(self) -> FlowKind {
        match self {
            DemoFlow::Member => FlowKind::MemberApplication,
            DemoFlow::Event => FlowKind::EventRegistration,
        }
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Which intake flow to walk through
    #[arg(long, value_enum, default_value_t = DemoFlow::Member)]
    pub(crate) flow: DemoFlow,
    /// Photo to upload. The content type is guessed from the extension.
    #[arg(long)]
    pub(crate) photo: Option<PathBuf>,
    /// Supporting document to upload (membership flow only)
    #[arg(long)]
    pub(crate) document: Option<PathBuf>,
    /// Print the final session view as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        flow,
        photo,
        document,
        json,
    } = args;

    let uploads = InMemoryUploadStore::default();
    let inbox = InMemorySubmissionInbox::default();
    let blueprint = FlowBlueprint::for_kind(flow.kind());
    let required_slots = blueprint.required_slots().to_vec();
    let mut session = IntakeSession::new(
        blueprint,
        SubjectId("demo-applicant".to_string()),
        collaborators(uploads.clone(), inbox.clone()),
    )?;

    println!("Intake demo: {}", flow.kind().label());

    println!("\nTerms and conditions");
    for scroll_top in [0.0, 450.0, 950.0] {
        let state = session.observe_terms(ScrollGeometry {
            scroll_top,
            scroll_height: 1100.0,
            client_height: 100.0,
        });
        println!(
            "- scrolled to {:.0}% -> consent {}",
            state.scroll_progress,
            if state.unlocked { "unlocked" } else { "locked" }
        );
    }
    let consent = session.set_consent(true);
    println!("- consent accepted: {}", consent.accepted);

    println!("\nUploads");
    let photo = load_file(photo.as_deref(), "portrait.png", "image/png")?;
    session.select_file(UploadSlot::Photo, photo)?;
    if required_slots.contains(&UploadSlot::Document) {
        let document = load_file(document.as_deref(), "statement.pdf", "application/pdf")?;
        session.select_file(UploadSlot::Document, document)?;
    }
    session.settle_uploads().await;
    for slot in UploadSlot::ALL {
        let status = session.upload_status(slot);
        match status.reference().and_then(|reference| uploads.fetch(reference)) {
            Some(blob) => println!(
                "- {}: {} ({}, {} bytes)",
                slot.label(),
                status.label(),
                blob.content_type,
                blob.size()
            ),
            None => println!("- {}: {}", slot.label(), status.label()),
        }
    }

    println!("\nAnswers");
    match flow {
        DemoFlow::Member => {
            session.edit(RecordEdit::Specialization(Some(Specialization::Listed(
                "Public Health".to_string(),
            ))))?;
        }
        DemoFlow::Event => {
            session.edit(RecordEdit::ContactEmail(Some(
                "demo.applicant@example.org".to_string(),
            )))?;
        }
    }
    session.edit(RecordEdit::Motivation(DEMO_MOTIVATION.to_string()))?;
    let view = session.view();
    println!("- {}", view.motivation_prompt);
    println!("  {} words written", word_count(DEMO_MOTIVATION));
    for section in &view.sections {
        println!(
            "- {:<24} {}",
            section.title,
            if section.complete { "complete" } else { "incomplete" }
        );
    }

    println!("\nNavigation");
    loop {
        match session.advance() {
            ContinueOutcome::Advanced(section) => println!("- continue -> {}", section.label()),
            ContinueOutcome::SubmitRequested => {
                println!("- submit requested");
                break;
            }
        }
    }

    match session.submit().await {
        Ok(receipt) => println!(
            "\nSubmitted: confirmation {} at {}",
            receipt.confirmation,
            receipt.submitted_at.to_rfc3339()
        ),
        Err(err) => println!("\nSubmission not sent: {err}"),
    }
    println!(
        "Inbox holds {} submission(s); {} blob(s) stored",
        inbox.received().len(),
        uploads.stored()
    );

    if json {
        match serde_json::to_string_pretty(&session.view()) {
            Ok(json) => println!("\nSession view:\n{json}"),
            Err(err) => println!("\nSession view unavailable: {err}"),
        }
    }

    Ok(())
}

/// Read a file from disk, or fall back to a small synthetic blob for the demo.
pub(crate) fn load_file(
    path: Option<&Path>,
    fallback_name: &str,
    fallback_type: &str,
) -> Result<FileBlob, AppError> {
    let Some(path) = path else {
        return Ok(FileBlob::new(
            fallback_name,
            fallback_type,
            b"demo-bytes".to_vec(),
        ));
    };

    let bytes = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback_name.to_string());
    let content_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    Ok(FileBlob::new(file_name, content_type, bytes))
}
