//! Sled-backed document store: one tree per entity plus dedicated
//! unique-index trees.
//!
//! Documents are serialized with serde_json. Writes are atomic at the
//! document level; field updates run as a closure over the deserialized
//! document inside a compare-and-swap loop, so concurrent writers retry
//! instead of losing updates. Unique constraints (assessment link, session
//! token, one attempt per candidate+JD, one answer per section) are claimed
//! via compare-and-swap against `None`.

use crate::error::{EngineError, EngineResult};
use crate::model::{
    AssessmentAnswer, AssessmentSet, CandidateAssessment, CandidateUser, Evaluation,
    FollowUpQuestion, InterviewMetadata, JobDescription, OtpRecord, ProctoringEvent, Section,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use std::path::Path;
use uuid::Uuid;

const TREE_JDS: &str = "jds";
const TREE_SETS: &str = "sets";
const TREE_CANDIDATES: &str = "candidates";
const TREE_ANSWERS: &str = "answers";
const TREE_EVENTS: &str = "proctoring_events";
const TREE_EVALUATIONS: &str = "evaluations";
const TREE_INTERVIEWS: &str = "interviews";
const TREE_FOLLOWUPS: &str = "followups";
const TREE_OTPS: &str = "otps";
const TREE_USERS: &str = "users";
const TREE_AUDIT: &str = "audit_log";

const IDX_ASSESSMENT_LINK: &str = "idx_assessment_link";
const IDX_SESSION_TOKEN: &str = "idx_session_token";
const IDX_CANDIDATE_JD: &str = "idx_candidate_jd";
const IDX_ANSWER_SECTION: &str = "idx_answer_section";
const IDX_JD_COMPANY: &str = "idx_jd_company";
const IDX_CANDIDATE_BY_JD: &str = "idx_candidate_by_jd";
const IDX_EVENT_BY_CA: &str = "idx_event_by_ca";
const IDX_USER_EMAIL: &str = "idx_user_email";

/// Append-only admin action record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub actor: String,
    pub action: String,
    pub target: String,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        actor: impl Into<String>,
        action: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            actor: actor.into(),
            action: action.into(),
            target: target.into(),
            detail: None,
            at: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

pub struct Store {
    #[allow(dead_code)]
    db: Db,
    jds: Tree,
    sets: Tree,
    candidates: Tree,
    answers: Tree,
    events: Tree,
    evaluations: Tree,
    interviews: Tree,
    followups: Tree,
    otps: Tree,
    users: Tree,
    audit: Tree,
    idx_link: Tree,
    idx_session: Tree,
    idx_candidate_jd: Tree,
    idx_answer_section: Tree,
    idx_jd_company: Tree,
    idx_candidate_by_jd: Tree,
    idx_event_by_ca: Tree,
    idx_user_email: Tree,
}

fn encode<T: Serialize>(value: &T) -> EngineResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> EngineResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Big-endian inverted millisecond timestamp, so lexicographic tree order is
/// newest-first.
fn inverted_ts(at: DateTime<Utc>) -> String {
    format!("{:020}", i64::MAX - at.timestamp_millis())
}

fn ts_key(at: DateTime<Utc>) -> String {
    format!("{:020}", at.timestamp_millis())
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let db = sled::open(path)?;
        Ok(Self {
            jds: db.open_tree(TREE_JDS)?,
            sets: db.open_tree(TREE_SETS)?,
            candidates: db.open_tree(TREE_CANDIDATES)?,
            answers: db.open_tree(TREE_ANSWERS)?,
            events: db.open_tree(TREE_EVENTS)?,
            evaluations: db.open_tree(TREE_EVALUATIONS)?,
            interviews: db.open_tree(TREE_INTERVIEWS)?,
            followups: db.open_tree(TREE_FOLLOWUPS)?,
            otps: db.open_tree(TREE_OTPS)?,
            users: db.open_tree(TREE_USERS)?,
            audit: db.open_tree(TREE_AUDIT)?,
            idx_link: db.open_tree(IDX_ASSESSMENT_LINK)?,
            idx_session: db.open_tree(IDX_SESSION_TOKEN)?,
            idx_candidate_jd: db.open_tree(IDX_CANDIDATE_JD)?,
            idx_answer_section: db.open_tree(IDX_ANSWER_SECTION)?,
            idx_jd_company: db.open_tree(IDX_JD_COMPANY)?,
            idx_candidate_by_jd: db.open_tree(IDX_CANDIDATE_BY_JD)?,
            idx_event_by_ca: db.open_tree(IDX_EVENT_BY_CA)?,
            idx_user_email: db.open_tree(IDX_USER_EMAIL)?,
            db,
        })
    }

    /// CAS update loop: load, apply `mutate`, swap; retried on contention so
    /// a concurrent field update is never lost.
    fn update_in<T, F>(tree: &Tree, key: &[u8], what: &str, mut mutate: F) -> EngineResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(&mut T) -> EngineResult<()>,
    {
        loop {
            let Some(current) = tree.get(key)? else {
                return Err(EngineError::not_found(what));
            };
            let mut doc: T = decode(&current)?;
            mutate(&mut doc)?;
            let next = encode(&doc)?;
            match tree.compare_and_swap(key, Some(&current), Some(next))? {
                Ok(()) => return Ok(doc),
                Err(_) => continue,
            }
        }
    }

    /// Claims a unique-index slot. `Ok(true)` when the claim won; `Ok(false)`
    /// when the key is already held by a different owner. Re-claiming with
    /// the same owner is a no-op success.
    fn claim_unique(tree: &Tree, key: &[u8], owner: &str) -> EngineResult<bool> {
        match tree.compare_and_swap(key, None::<&[u8]>, Some(owner.as_bytes()))? {
            Ok(()) => Ok(true),
            Err(cas) => Ok(cas
                .current
                .map(|held| held.as_ref() == owner.as_bytes())
                .unwrap_or(false)),
        }
    }

    // -- Job descriptions ---------------------------------------------------

    pub fn insert_jd(&self, jd: &JobDescription) -> EngineResult<()> {
        self.jds.insert(jd.id.as_bytes(), encode(jd)?)?;
        let company_key = format!("{}/{}", jd.company_id, inverted_ts(jd.created_at));
        self.idx_jd_company
            .insert(company_key.as_bytes(), jd.id.as_bytes())?;
        Ok(())
    }

    pub fn get_jd(&self, id: &str) -> EngineResult<Option<JobDescription>> {
        self.jds.get(id.as_bytes())?.map(|b| decode(&b)).transpose()
    }

    pub fn require_jd(&self, id: &str) -> EngineResult<JobDescription> {
        self.get_jd(id)?
            .ok_or_else(|| EngineError::not_found("job description"))
    }

    pub fn update_jd<F>(&self, id: &str, mut mutate: F) -> EngineResult<JobDescription>
    where
        F: FnMut(&mut JobDescription) -> EngineResult<()>,
    {
        Self::update_in(&self.jds, id.as_bytes(), "job description", |jd: &mut JobDescription| {
            mutate(jd)?;
            jd.updated_at = Utc::now();
            Ok(())
        })
    }

    /// Company listing, created-at descending (index-tree order).
    pub fn list_jds_by_company(&self, company_id: &str) -> EngineResult<Vec<JobDescription>> {
        let prefix = format!("{company_id}/");
        let mut out = Vec::new();
        for item in self.idx_jd_company.scan_prefix(prefix.as_bytes()) {
            let (_, id) = item?;
            let id = String::from_utf8_lossy(&id).to_string();
            if let Some(jd) = self.get_jd(&id)? {
                out.push(jd);
            }
        }
        Ok(out)
    }

    /// Claims an assessment link for a JD. Unique-sparse: `false` means the
    /// link is taken and the caller should mint another.
    pub fn claim_assessment_link(&self, link: &str, jd_id: &str) -> EngineResult<bool> {
        Self::claim_unique(&self.idx_link, link.as_bytes(), jd_id)
    }

    /// Releases a claimed link (set-generation rollback).
    pub fn release_assessment_link(&self, link: &str) -> EngineResult<()> {
        self.idx_link.remove(link.as_bytes())?;
        Ok(())
    }

    pub fn get_jd_by_link(&self, link: &str) -> EngineResult<Option<JobDescription>> {
        let Some(id) = self.idx_link.get(link.as_bytes())? else {
            return Ok(None);
        };
        self.get_jd(&String::from_utf8_lossy(&id))
    }

    pub fn delete_jd(&self, jd: &JobDescription) -> EngineResult<()> {
        self.jds.remove(jd.id.as_bytes())?;
        let company_key = format!("{}/{}", jd.company_id, inverted_ts(jd.created_at));
        self.idx_jd_company.remove(company_key.as_bytes())?;
        if let Some(link) = &jd.assessment_link {
            self.idx_link.remove(link.as_bytes())?;
        }
        Ok(())
    }

    // -- Assessment sets ----------------------------------------------------

    /// Validates and persists a set. Structural invariants are enforced here
    /// so no write path can bypass them.
    pub fn insert_set(&self, set: &AssessmentSet) -> EngineResult<()> {
        set.validate()?;
        self.sets.insert(set.id.as_bytes(), encode(set)?)?;
        Ok(())
    }

    pub fn get_set(&self, id: &str) -> EngineResult<Option<AssessmentSet>> {
        self.sets.get(id.as_bytes())?.map(|b| decode(&b)).transpose()
    }

    pub fn require_set(&self, id: &str) -> EngineResult<AssessmentSet> {
        self.get_set(id)?
            .ok_or_else(|| EngineError::not_found("assessment set"))
    }

    pub fn update_set<F>(&self, id: &str, mutate: F) -> EngineResult<AssessmentSet>
    where
        F: FnMut(&mut AssessmentSet) -> EngineResult<()>,
    {
        Self::update_in(&self.sets, id.as_bytes(), "assessment set", mutate)
    }

    pub fn delete_set(&self, id: &str) -> EngineResult<()> {
        self.sets.remove(id.as_bytes())?;
        Ok(())
    }

    // -- Candidate assessments ----------------------------------------------

    /// Inserts a new attempt, enforcing one per `(candidate, jd)`. Returns
    /// `Conflict` when the pair already has one.
    pub fn insert_candidate(&self, ca: &CandidateAssessment) -> EngineResult<()> {
        let pair_key = format!("{}/{}", ca.candidate_id, ca.jd_id);
        if !Self::claim_unique(&self.idx_candidate_jd, pair_key.as_bytes(), &ca.id)? {
            return Err(EngineError::conflict(
                "candidate already registered for this assessment",
            ));
        }
        self.candidates.insert(ca.id.as_bytes(), encode(ca)?)?;
        let jd_key = format!("{}/{}", ca.jd_id, ca.id);
        self.idx_candidate_by_jd
            .insert(jd_key.as_bytes(), ca.id.as_bytes())?;
        Ok(())
    }

    pub fn get_candidate(&self, id: &str) -> EngineResult<Option<CandidateAssessment>> {
        self.candidates
            .get(id.as_bytes())?
            .map(|b| decode(&b))
            .transpose()
    }

    pub fn require_candidate(&self, id: &str) -> EngineResult<CandidateAssessment> {
        self.get_candidate(id)?
            .ok_or_else(|| EngineError::not_found("candidate assessment"))
    }

    pub fn get_candidate_by_pair(
        &self,
        candidate_id: &str,
        jd_id: &str,
    ) -> EngineResult<Option<CandidateAssessment>> {
        let pair_key = format!("{candidate_id}/{jd_id}");
        let Some(id) = self.idx_candidate_jd.get(pair_key.as_bytes())? else {
            return Ok(None);
        };
        self.get_candidate(&String::from_utf8_lossy(&id))
    }

    pub fn update_candidate<F>(&self, id: &str, mut mutate: F) -> EngineResult<CandidateAssessment>
    where
        F: FnMut(&mut CandidateAssessment) -> EngineResult<()>,
    {
        Self::update_in(
            &self.candidates,
            id.as_bytes(),
            "candidate assessment",
            |ca: &mut CandidateAssessment| {
                mutate(ca)?;
                ca.updated_at = Utc::now();
                Ok(())
            },
        )
    }

    pub fn list_candidates_for_jd(&self, jd_id: &str) -> EngineResult<Vec<CandidateAssessment>> {
        let prefix = format!("{jd_id}/");
        let mut out = Vec::new();
        for item in self.idx_candidate_by_jd.scan_prefix(prefix.as_bytes()) {
            let (_, id) = item?;
            if let Some(ca) = self.get_candidate(&String::from_utf8_lossy(&id))? {
                out.push(ca);
            }
        }
        Ok(out)
    }

    pub fn delete_candidate(&self, ca: &CandidateAssessment) -> EngineResult<()> {
        self.candidates.remove(ca.id.as_bytes())?;
        let pair_key = format!("{}/{}", ca.candidate_id, ca.jd_id);
        self.idx_candidate_jd.remove(pair_key.as_bytes())?;
        let jd_key = format!("{}/{}", ca.jd_id, ca.id);
        self.idx_candidate_by_jd.remove(jd_key.as_bytes())?;
        if let Some(token) = &ca.session_token {
            self.idx_session.remove(token.as_bytes())?;
        }
        Ok(())
    }

    /// Claims a session token for an attempt (unique-sparse).
    pub fn claim_session_token(&self, token: &str, ca_id: &str) -> EngineResult<bool> {
        Self::claim_unique(&self.idx_session, token.as_bytes(), ca_id)
    }

    pub fn release_session_token(&self, token: &str) -> EngineResult<()> {
        self.idx_session.remove(token.as_bytes())?;
        Ok(())
    }

    pub fn get_candidate_by_session(
        &self,
        token: &str,
    ) -> EngineResult<Option<CandidateAssessment>> {
        let Some(id) = self.idx_session.get(token.as_bytes())? else {
            return Ok(None);
        };
        self.get_candidate(&String::from_utf8_lossy(&id))
    }

    // -- Answers ------------------------------------------------------------

    /// Fetches the per-section answer document, creating it on first touch.
    /// Uniqueness of `(attempt, section)` is index-enforced.
    pub fn get_or_create_answer(
        &self,
        ca_id: &str,
        section: Section,
    ) -> EngineResult<AssessmentAnswer> {
        if let Some(existing) = self.get_answer(ca_id, section)? {
            return Ok(existing);
        }
        let answer = AssessmentAnswer::new(ca_id, section);
        let idx_key = format!("{ca_id}/{section}");
        if !Self::claim_unique(&self.idx_answer_section, idx_key.as_bytes(), &answer.id)? {
            // Lost the creation race; the winner's document is authoritative.
            return self
                .get_answer(ca_id, section)?
                .ok_or_else(|| EngineError::not_found("assessment answer"));
        }
        self.answers.insert(answer.id.as_bytes(), encode(&answer)?)?;
        Ok(answer)
    }

    pub fn get_answer(
        &self,
        ca_id: &str,
        section: Section,
    ) -> EngineResult<Option<AssessmentAnswer>> {
        let idx_key = format!("{ca_id}/{section}");
        let Some(id) = self.idx_answer_section.get(idx_key.as_bytes())? else {
            return Ok(None);
        };
        self.answers
            .get(&id)?
            .map(|b| decode(&b))
            .transpose()
    }

    pub fn update_answer<F>(
        &self,
        ca_id: &str,
        section: Section,
        mutate: F,
    ) -> EngineResult<AssessmentAnswer>
    where
        F: FnMut(&mut AssessmentAnswer) -> EngineResult<()>,
    {
        let answer = self.get_or_create_answer(ca_id, section)?;
        Self::update_in(&self.answers, answer.id.as_bytes(), "assessment answer", mutate)
    }

    pub fn list_answers(&self, ca_id: &str) -> EngineResult<Vec<AssessmentAnswer>> {
        let mut out = Vec::new();
        for section in Section::ORDER {
            if let Some(answer) = self.get_answer(ca_id, section)? {
                out.push(answer);
            }
        }
        Ok(out)
    }

    pub fn delete_answers(&self, ca_id: &str) -> EngineResult<()> {
        for section in Section::ORDER {
            let idx_key = format!("{ca_id}/{section}");
            if let Some(id) = self.idx_answer_section.remove(idx_key.as_bytes())? {
                self.answers.remove(&id)?;
            }
        }
        Ok(())
    }

    // -- Proctoring events --------------------------------------------------

    pub fn append_event(&self, event: &ProctoringEvent) -> EngineResult<()> {
        self.events.insert(event.id.as_bytes(), encode(event)?)?;
        let idx_key = format!(
            "{}/{}/{}",
            event.candidate_assessment_id,
            ts_key(event.occurred_at),
            event.id
        );
        self.idx_event_by_ca
            .insert(idx_key.as_bytes(), event.id.as_bytes())?;
        Ok(())
    }

    pub fn get_event(&self, id: &str) -> EngineResult<Option<ProctoringEvent>> {
        self.events.get(id.as_bytes())?.map(|b| decode(&b)).transpose()
    }

    pub fn update_event<F>(&self, id: &str, mutate: F) -> EngineResult<ProctoringEvent>
    where
        F: FnMut(&mut ProctoringEvent) -> EngineResult<()>,
    {
        Self::update_in(&self.events, id.as_bytes(), "proctoring event", mutate)
    }

    /// Events for one attempt, oldest first.
    pub fn list_events(&self, ca_id: &str) -> EngineResult<Vec<ProctoringEvent>> {
        let prefix = format!("{ca_id}/");
        let mut out = Vec::new();
        for item in self.idx_event_by_ca.scan_prefix(prefix.as_bytes()) {
            let (_, id) = item?;
            if let Some(event) = self.get_event(&String::from_utf8_lossy(&id))? {
                out.push(event);
            }
        }
        Ok(out)
    }

    pub fn delete_events(&self, ca_id: &str) -> EngineResult<()> {
        let prefix = format!("{ca_id}/");
        for item in self.idx_event_by_ca.scan_prefix(prefix.as_bytes()) {
            let (key, id) = item?;
            self.events.remove(&id)?;
            self.idx_event_by_ca.remove(key)?;
        }
        Ok(())
    }

    // -- Evaluations ---------------------------------------------------------

    /// Keyed by attempt id: unique per candidate assessment by construction,
    /// and re-running an evaluation replaces the previous document.
    pub fn put_evaluation(&self, evaluation: &Evaluation) -> EngineResult<()> {
        self.evaluations.insert(
            evaluation.candidate_assessment_id.as_bytes(),
            encode(evaluation)?,
        )?;
        Ok(())
    }

    pub fn get_evaluation(&self, ca_id: &str) -> EngineResult<Option<Evaluation>> {
        self.evaluations
            .get(ca_id.as_bytes())?
            .map(|b| decode(&b))
            .transpose()
    }

    pub fn update_evaluation<F>(&self, ca_id: &str, mutate: F) -> EngineResult<Evaluation>
    where
        F: FnMut(&mut Evaluation) -> EngineResult<()>,
    {
        Self::update_in(&self.evaluations, ca_id.as_bytes(), "evaluation", mutate)
    }

    pub fn delete_evaluation(&self, ca_id: &str) -> EngineResult<()> {
        self.evaluations.remove(ca_id.as_bytes())?;
        Ok(())
    }

    // -- Adaptive interviews -------------------------------------------------

    pub fn put_interview(&self, meta: &InterviewMetadata) -> EngineResult<()> {
        self.interviews
            .insert(meta.candidate_assessment_id.as_bytes(), encode(meta)?)?;
        Ok(())
    }

    pub fn get_interview(&self, ca_id: &str) -> EngineResult<Option<InterviewMetadata>> {
        self.interviews
            .get(ca_id.as_bytes())?
            .map(|b| decode(&b))
            .transpose()
    }

    pub fn update_interview<F>(&self, ca_id: &str, mut mutate: F) -> EngineResult<InterviewMetadata>
    where
        F: FnMut(&mut InterviewMetadata) -> EngineResult<()>,
    {
        Self::update_in(
            &self.interviews,
            ca_id.as_bytes(),
            "interview metadata",
            |meta: &mut InterviewMetadata| {
                mutate(meta)?;
                meta.updated_at = Utc::now();
                Ok(())
            },
        )
    }

    /// Inserts a follow-up at its sort-key slot. The key is unique per
    /// `(interview, sort_key)`; losing the race is a `Conflict`, which the
    /// follow-up engine treats as "someone else already filled this slot".
    pub fn insert_followup(&self, followup: &FollowUpQuestion) -> EngineResult<()> {
        let key = followup_key(&followup.interview_id, followup.sort_key);
        let value = encode(followup)?;
        match self
            .followups
            .compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(value))?
        {
            Ok(()) => Ok(()),
            Err(_) => Err(EngineError::conflict("follow-up slot already taken")),
        }
    }

    /// Follow-ups for one interview in ascending sort-key order.
    pub fn list_followups(&self, interview_id: &str) -> EngineResult<Vec<FollowUpQuestion>> {
        let prefix = format!("{interview_id}/");
        let mut out = Vec::new();
        for item in self.followups.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = item?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    /// Removes an interview and its follow-ups.
    pub fn delete_interview(&self, ca_id: &str) -> EngineResult<()> {
        if let Some(meta) = self.get_interview(ca_id)? {
            let prefix = format!("{}/", meta.id);
            for item in self.followups.scan_prefix(prefix.as_bytes()) {
                let (key, _) = item?;
                self.followups.remove(key)?;
            }
        }
        self.interviews.remove(ca_id.as_bytes())?;
        Ok(())
    }

    // -- One-time passcodes --------------------------------------------------

    /// Marks all prior unverified codes for `(email, purpose)` as spent by
    /// deleting them, then stores the new record.
    pub fn replace_otp(&self, otp: &OtpRecord) -> EngineResult<()> {
        let prefix = format!("{}/{}/", otp.email, otp.purpose);
        for item in self.otps.scan_prefix(prefix.as_bytes()) {
            let (key, bytes) = item?;
            let existing: OtpRecord = decode(&bytes)?;
            if !existing.verified {
                self.otps.remove(key)?;
            }
        }
        self.otps.insert(otp_key(otp).as_bytes(), encode(otp)?)?;
        Ok(())
    }

    /// The newest live code for `(email, purpose)`. Expired records are
    /// deleted on touch, which stands in for a TTL index.
    pub fn latest_otp(&self, email: &str, purpose: &str) -> EngineResult<Option<OtpRecord>> {
        let prefix = format!("{email}/{purpose}/");
        let now = Utc::now();
        let mut newest: Option<OtpRecord> = None;
        for item in self.otps.scan_prefix(prefix.as_bytes()) {
            let (key, bytes) = item?;
            let record: OtpRecord = decode(&bytes)?;
            if record.is_expired(now) {
                self.otps.remove(key)?;
                continue;
            }
            if newest
                .as_ref()
                .map(|n| record.created_at > n.created_at)
                .unwrap_or(true)
            {
                newest = Some(record);
            }
        }
        Ok(newest)
    }

    pub fn update_otp<F>(&self, otp: &OtpRecord, mutate: F) -> EngineResult<OtpRecord>
    where
        F: FnMut(&mut OtpRecord) -> EngineResult<()>,
    {
        Self::update_in(&self.otps, otp_key(otp).as_bytes(), "passcode", mutate)
    }

    // -- Users ---------------------------------------------------------------

    /// Upserts a candidate user by email. Existing users keep their id; the
    /// name is refreshed.
    pub fn upsert_user(&self, email: &str, name: &str) -> EngineResult<CandidateUser> {
        if let Some(id) = self.idx_user_email.get(email.as_bytes())? {
            let id = String::from_utf8_lossy(&id).to_string();
            return Self::update_in(&self.users, id.as_bytes(), "user", |u: &mut CandidateUser| {
                if !name.is_empty() {
                    u.name = name.to_string();
                }
                Ok(())
            });
        }
        let user = CandidateUser::new(email, name);
        self.users.insert(user.id.as_bytes(), encode(&user)?)?;
        self.idx_user_email
            .insert(email.as_bytes(), user.id.as_bytes())?;
        Ok(user)
    }

    pub fn get_user(&self, id: &str) -> EngineResult<Option<CandidateUser>> {
        self.users.get(id.as_bytes())?.map(|b| decode(&b)).transpose()
    }

    pub fn update_user<F>(&self, id: &str, mutate: F) -> EngineResult<CandidateUser>
    where
        F: FnMut(&mut CandidateUser) -> EngineResult<()>,
    {
        Self::update_in(&self.users, id.as_bytes(), "user", mutate)
    }

    // -- Audit log ------------------------------------------------------------

    pub fn append_audit(&self, record: &AuditRecord) -> EngineResult<()> {
        let key = format!("{}/{}", ts_key(record.at), record.id);
        self.audit.insert(key.as_bytes(), encode(record)?)?;
        Ok(())
    }

    pub fn list_audit(&self, limit: usize) -> EngineResult<Vec<AuditRecord>> {
        let mut out = Vec::new();
        for item in self.audit.iter().rev().take(limit) {
            let (_, bytes) = item?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }
}

fn followup_key(interview_id: &str, sort_key: i64) -> String {
    format!("{interview_id}/{sort_key:010}")
}

fn otp_key(otp: &OtpRecord) -> String {
    format!("{}/{}/{}/{}", otp.email, otp.purpose, ts_key(otp.created_at), otp.id)
}
