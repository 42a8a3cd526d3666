use chrono::{Duration, Local, NaiveDateTime};
use serde::Serialize;

use crate::errors::{AppError, BookingError};
use crate::models::{Doctor, InsuranceInfo, Location, PatientIdentity};
use crate::services::booking;
use crate::services::collector::StepOutcome;
use crate::services::directory::DATABASE_UNAVAILABLE;
use crate::services::reminders;
use crate::services::session::{Session, SessionStep};
use crate::services::slots::describe_slot;
use crate::state::AppState;

const TRANSACTION_FAILURE: &str =
    "Sorry, an error occurred while processing your request. Please try again.";

const RESTART_COMMANDS: [&str; 3] = ["restart", "start over", "reset"];

const OPENERS: [&str; 7] = ["hi", "hello", "hey", "hi there", "hello there", "start", "book"];

const INTRO: &str = "Hello! I'm the appointment assistant for our clinic. I'll help you book an \
                     appointment in a few quick steps. Reply 'restart' at any time to start over.";

#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub reply: String,
    pub step: SessionStep,
}

pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Opens a fresh session under `session_id` (replacing any previous one) and
/// returns the greeting.
pub fn start_session(state: &AppState, session_id: &str) -> String {
    let now = now();
    let previous = state.sessions().get(session_id, now);
    if let Some(previous) = previous {
        release_unconfirmed(state, &previous);
    }
    state
        .sessions()
        .save(Session::new(session_id.to_string(), now, ttl(state)));
    tracing::info!(session = %session_id, "session started");
    greeting()
}

/// One text-in/text-out turn for an existing session.
///
/// The turn runs on a copy of the session that is stored back only when the
/// turn succeeds. On failure the user gets an apology and the session stays
/// where it was.
pub async fn process_turn(
    state: &AppState,
    session_id: &str,
    text: Option<&str>,
) -> Result<TurnReply, AppError> {
    let now = now();
    expire_sessions(state, now);

    let session = state.sessions().get(session_id, now);
    let Some(mut session) = session else {
        return Err(AppError::NotFound(format!("session {session_id}")));
    };

    let step_before = session.step;
    tracing::info!(session = %session_id, step = step_before.as_str(), "processing turn");

    match run_turn(state, &mut session, text, now).await {
        Ok(reply) => {
            session.touch(now, ttl(state));
            let step = session.step;
            state.sessions().save(session);
            Ok(TurnReply { reply, step })
        }
        Err(e) => {
            tracing::error!(session = %session_id, step = step_before.as_str(), error = %e, "turn failed");
            Ok(TurnReply {
                reply: TRANSACTION_FAILURE.to_string(),
                step: step_before,
            })
        }
    }
}

/// Entry point for channels without an explicit session start (SMS), keyed
/// by the sender's number.
///
/// Without a live session the text is either a reply to a reminder already
/// sent for one of the sender's appointments, or the first message of a new
/// booking. A first message that carries content is answered as a turn, not
/// just with the greeting.
pub async fn handle_inbound(state: &AppState, session_id: &str, text: &str) -> TurnReply {
    let live = state.sessions().get(session_id, now()).is_some();
    if live {
        // NotFound here means it expired since the check
        if let Ok(reply) = process_turn(state, session_id, Some(text)).await {
            return reply;
        }
    }

    if !is_restart(text) {
        let pending = state.ledger().awaiting_reply_for_phone(session_id);
        if let Some(appointment_id) = pending {
            tracing::info!(session = %session_id, appointment_id = %appointment_id, "routing reply to reminder");
            return TurnReply {
                reply: reminders::handle_reply(state, &appointment_id, text.trim()).await,
                step: SessionStep::Completed,
            };
        }
    }

    let greeting = start_session(state, session_id);
    if is_opener(text) {
        return TurnReply {
            reply: greeting,
            step: SessionStep::PatientIntake,
        };
    }

    match process_turn(state, session_id, Some(text)).await {
        Ok(turn) => TurnReply {
            reply: format!("{INTRO}\n\n{}", turn.reply),
            step: turn.step,
        },
        Err(_) => TurnReply {
            reply: greeting,
            step: SessionStep::PatientIntake,
        },
    }
}

async fn run_turn(
    state: &AppState,
    session: &mut Session,
    text: Option<&str>,
    now: NaiveDateTime,
) -> anyhow::Result<String> {
    let trimmed = text.map(str::trim).unwrap_or("");

    if is_restart(trimmed) {
        release_unconfirmed(state, session);
        *session = Session::new(session.id.clone(), now, ttl(state));
        return Ok(greeting());
    }

    match session.step {
        SessionStep::PatientIntake => patient_intake(state, session, text, now).await,
        SessionStep::PatientLookup => lookup_and_search(state, session, now),
        SessionStep::SlotSelection => slot_selection(state, session, trimmed, now),
        SessionStep::InsuranceIntake => insurance_intake(state, session, text, now).await,
        SessionStep::Completed => {
            let Some(appointment_id) = session.appointment_id.clone() else {
                anyhow::bail!("completed session without an appointment id");
            };
            Ok(reminders::handle_reply(state, &appointment_id, trimmed).await)
        }
    }
}

async fn patient_intake(
    state: &AppState,
    session: &mut Session,
    text: Option<&str>,
    now: NaiveDateTime,
) -> anyhow::Result<String> {
    let today = now.date();
    let trimmed = text.map(str::trim).filter(|t| !t.is_empty());

    let mut acknowledgements = Vec::new();
    if let (Some(extractor), Some(input)) = (state.extractor.as_deref(), trimmed) {
        let pending = session.intake.pending_fields();
        match extractor.extract_many(input, &pending).await {
            Ok(found) => {
                for (field, value) in found {
                    if let Some(ack) = session.intake.prefill(field, &value, today) {
                        acknowledgements.push(ack);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(session = %session.id, error = %e, "field extraction failed, validating input directly");
            }
        }
    }

    let outcome = if acknowledgements.is_empty() {
        session.intake.submit(trimmed, today)
    } else {
        session.intake.resume(acknowledgements)
    };

    match outcome {
        StepOutcome::NotHeard(msg) | StepOutcome::Rejected(msg) | StepOutcome::Accepted(msg) => {
            Ok(msg)
        }
        StepOutcome::Complete { message, values } => {
            let patient = PatientIdentity::from_fields(&values)
                .ok_or_else(|| anyhow::anyhow!("patient intake completed with missing fields"))?;
            session.patient = Some(patient);
            session.step = SessionStep::PatientLookup;
            let next = lookup_and_search(state, session, now)?;
            Ok(format!("{message}\n\n{next}"))
        }
    }
}

fn lookup_and_search(
    state: &AppState,
    session: &mut Session,
    now: NaiveDateTime,
) -> anyhow::Result<String> {
    let Some(patient) = session.patient.clone() else {
        anyhow::bail!("lookup without a patient identity");
    };

    let looked_up = {
        let mut directory = state.directory();
        directory.ensure_loaded();
        directory.lookup(&patient, now.date())
    };

    let (message, lookup) = match looked_up {
        Ok(found) => found,
        Err(AppError::LookupUnavailable) => {
            tracing::warn!(session = %session.id, "patient directory unavailable");
            session.step = SessionStep::PatientLookup;
            return Ok(DATABASE_UNAVAILABLE.to_string());
        }
        Err(e) => return Err(e.into()),
    };

    session.lookup = Some(lookup);
    let slots = search_slots(state, session, now)?;
    Ok(format!("{message}\n\n{slots}"))
}

fn search_slots(
    state: &AppState,
    session: &mut Session,
    now: NaiveDateTime,
) -> anyhow::Result<String> {
    let (Some(patient), Some(lookup)) = (&session.patient, &session.lookup) else {
        anyhow::bail!("slot search before lookup");
    };

    let (message, slots) = state.schedule().find(
        patient.doctor,
        patient.location,
        lookup.appointment_duration(),
        now,
    );
    tracing::info!(
        session = %session.id,
        doctor = patient.doctor.as_str(),
        location = patient.location.as_str(),
        duration = lookup.appointment_duration(),
        offered = slots.len(),
        "slot search"
    );

    session.offered_slots = slots;
    session.step = SessionStep::SlotSelection;
    Ok(message)
}

fn slot_selection(
    state: &AppState,
    session: &mut Session,
    text: &str,
    now: NaiveDateTime,
) -> anyhow::Result<String> {
    let Some(patient) = session.patient.clone() else {
        anyhow::bail!("slot selection without a patient identity");
    };
    let Some(lookup) = session.lookup.clone() else {
        anyhow::bail!("slot selection without a lookup result");
    };

    if let Some(updated) = changed_preferences(&patient, text) {
        session.patient = Some(updated);
        return search_slots(state, session, now);
    }

    let max = session.offered_slots.len();
    if max == 0 {
        return Ok(format!(
            "There are no slots to choose from. Reply with another doctor ({}) or location ({}), \
             or 'restart' to start over.",
            Doctor::listing(),
            Location::listing()
        ));
    }

    let Some(choice) = parse_choice(text).filter(|n| (1..=max).contains(n)) else {
        return Ok(format!(
            "Please reply with a slot number between 1 and {max}."
        ));
    };
    let slot = session.offered_slots[choice - 1].clone();

    match booking::reserve(state, &slot, &lookup) {
        Ok(reservation) => {
            let when = describe_slot(&slot, reservation.duration_minutes);
            session.reservation = Some(reservation);
            session.offered_slots.clear();
            session.step = SessionStep::InsuranceIntake;

            let mut msg = format!(
                "Great! I've reserved {when} with {} at {} for you.\n\n",
                slot.doctor, slot.location
            );
            if let Some(existing) = &lookup.existing_insurance {
                msg.push_str(&format!(
                    "I see {} on file from your last visit. Please confirm your insurance details.\n\n",
                    existing.carrier
                ));
            } else {
                msg.push_str("Now I need your insurance information.\n\n");
            }
            msg.push_str(&session.insurance.current_prompt());
            Ok(msg)
        }
        Err(e @ (BookingError::SlotNotFound { .. } | BookingError::ConsecutiveSlotTaken { .. })) => {
            tracing::info!(session = %session.id, error = %e, "slot lost before booking");
            let fresh = search_slots(state, session, now)?;
            Ok(format!("Sorry, that time was just taken.\n\n{fresh}"))
        }
        Err(BookingError::ScheduleUnavailable) => Ok(
            "Sorry, the doctor schedule is not available right now. Please try again later."
                .to_string(),
        ),
        Err(e) => Err(e.into()),
    }
}

async fn insurance_intake(
    state: &AppState,
    session: &mut Session,
    text: Option<&str>,
    now: NaiveDateTime,
) -> anyhow::Result<String> {
    let outcome = session.insurance.submit(text, now.date());

    let (message, values) = match outcome {
        StepOutcome::NotHeard(msg) | StepOutcome::Rejected(msg) | StepOutcome::Accepted(msg) => {
            return Ok(msg)
        }
        StepOutcome::Complete { message, values } => (message, values),
    };

    let insurance = InsuranceInfo::from_fields(&values)
        .ok_or_else(|| anyhow::anyhow!("insurance intake completed with missing fields"))?;
    let (Some(patient), Some(lookup), Some(reservation)) = (
        session.patient.clone(),
        session.lookup.clone(),
        session.reservation.clone(),
    ) else {
        anyhow::bail!("insurance completed without patient, lookup and reservation");
    };

    let updated = state
        .directory()
        .update_insurance(&lookup.patient_id, &insurance);
    if let Err(e) = updated {
        tracing::warn!(session = %session.id, error = %e, "failed to store insurance on patient record");
    }

    let outcome =
        booking::confirm(state, &reservation, &lookup, &patient, &insurance, now).await?;

    session.appointment_id = Some(outcome.record.appointment_id.clone());
    session.step = SessionStep::Completed;
    Ok(format!("{message}\n\n{}", outcome.message))
}

/// A new doctor or location named during slot selection. `None` when the
/// text names neither or repeats the current choice.
fn changed_preferences(patient: &PatientIdentity, text: &str) -> Option<PatientIdentity> {
    let doctor = Doctor::find_in(text).unwrap_or(patient.doctor);
    let location = Location::find_in(text).unwrap_or(patient.location);
    if doctor == patient.doctor && location == patient.location {
        return None;
    }
    Some(patient.with_preferences(doctor, location))
}

fn parse_choice(text: &str) -> Option<usize> {
    let lower = text.trim().to_lowercase();
    if matches!(lower.as_str(), "first" | "yes" | "first one" | "the first one") {
        return Some(1);
    }
    let digits: String = lower
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn release_unconfirmed(state: &AppState, session: &Session) {
    if session.appointment_id.is_none() {
        if let Some(reservation) = &session.reservation {
            booking::release(state, reservation);
        }
    }
}

fn expire_sessions(state: &AppState, now: NaiveDateTime) {
    let expired = state.sessions().purge_expired(now);
    for session in &expired {
        release_unconfirmed(state, session);
    }
    if !expired.is_empty() {
        tracing::info!(count = expired.len(), "expired sessions removed");
    }
}

fn ttl(state: &AppState) -> Duration {
    Duration::minutes(state.config.session_ttl_minutes)
}

fn greeting() -> String {
    format!("{INTRO}\n\n{}", crate::models::Field::PatientName.prompt())
}

fn is_restart(text: &str) -> bool {
    RESTART_COMMANDS.contains(&text.trim().to_lowercase().as_str())
}

/// Empty text, a hello, or a restart command: nothing to collect yet.
fn is_opener(text: &str) -> bool {
    let lower = text.to_lowercase();
    let word = lower.trim().trim_matches(|c: char| !c.is_alphanumeric());
    word.is_empty() || OPENERS.contains(&word) || is_restart(word)
}
