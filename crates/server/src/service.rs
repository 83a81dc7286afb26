use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use rollcall_core::domain::action::ActionKind;
use rollcall_core::domain::attendance::MarkStatus;
use rollcall_core::domain::schedule::{filter_valid_indices, find_next_class, ClassRecord, UserId};
use rollcall_core::selection::SelectionMask;
use rollcall_core::store::{ActionLog, AttendanceStore, ScheduleStore, StoreError};
use rollcall_core::{
    ApplicationError, AttendanceService, CourseAttendanceSummary, OperatingTz, UndoEngine,
};
use rollcall_telegram::commands::{
    AttendanceCommandService, CallbackOutcome, CommandContext, CommandRouteError, MessageEdit,
};
use rollcall_telegram::keyboards::build_attendance_keyboard;
use rollcall_telegram::messages::{self, Reply};

/// The application behind the router: schedule resolution, the bulk
/// mutator, the undo engine, and status reads, rendered into replies.
/// One instance is constructed at bootstrap and shared by every handler.
pub struct BotService {
    attendance: Arc<dyn AttendanceStore>,
    schedule: Arc<dyn ScheduleStore>,
    marker: AttendanceService,
    undo: UndoEngine,
    tz: OperatingTz,
    connect_base_url: Option<String>,
}

impl BotService {
    pub fn new(
        attendance: Arc<dyn AttendanceStore>,
        schedule: Arc<dyn ScheduleStore>,
        actions: Arc<dyn ActionLog>,
        tz: OperatingTz,
        connect_base_url: Option<String>,
    ) -> Self {
        Self {
            marker: AttendanceService::new(attendance.clone(), actions.clone()),
            undo: UndoEngine::new(actions, attendance.clone(), schedule.clone(), tz),
            attendance,
            schedule,
            tz,
            connect_base_url,
        }
    }

    async fn classes_for(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> Result<Vec<ClassRecord>, StoreError> {
        let Some(enrollment) = self.schedule.enrollment(user_id).await? else {
            return Ok(Vec::new());
        };
        if enrollment.course_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.schedule
            .classes_by_date(&enrollment.batch_id, &enrollment.course_ids, date)
            .await
    }

    async fn todays_classes(&self, user_id: &UserId) -> Result<Vec<ClassRecord>, StoreError> {
        self.classes_for(user_id, self.tz.today(Utc::now())).await
    }

    async fn marked_flags(
        &self,
        user_id: &UserId,
        classes: &[ClassRecord],
    ) -> Result<Vec<bool>, StoreError> {
        let class_ids: Vec<_> = classes.iter().map(|class| class.class_id.clone()).collect();
        let statuses = self.attendance.attendance_status_bulk(user_id, &class_ids).await?;

        Ok(classes
            .iter()
            .map(|class| {
                statuses
                    .iter()
                    .find(|status| status.class_id == class.class_id)
                    .map(|status| status.is_marked)
                    .unwrap_or(false)
            })
            .collect())
    }
}

fn service_error(error: StoreError) -> CommandRouteError {
    CommandRouteError::Service(ApplicationError::from(error).to_string())
}

#[async_trait]
impl AttendanceCommandService for BotService {
    async fn start(&self, ctx: &CommandContext) -> Result<Reply, CommandRouteError> {
        if ctx.user_id.is_some() {
            return Ok(messages::already_connected());
        }

        let connect_url = self
            .connect_base_url
            .as_ref()
            .map(|base| format!("{base}?chat_id={}", ctx.chat_id));
        Ok(messages::welcome(connect_url.as_deref()))
    }

    async fn attend(&self, user_id: &UserId, indices: &[u32]) -> Result<Reply, CommandRouteError> {
        let classes = self.todays_classes(user_id).await.map_err(service_error)?;
        if classes.is_empty() {
            return Ok(messages::no_classes_today());
        }

        let now = Utc::now();

        if indices.is_empty() {
            if classes.len() == 1 {
                let status = self
                    .marker
                    .mark_class(user_id, &classes[0], now)
                    .await
                    .map_err(service_error)?;
                return Ok(messages::single_mark(&classes[0].course_name, status));
            }

            // multi-class day: offer the selection keyboard, pre-selecting a
            // class that is ongoing or about to start
            let preselected = find_next_class(&classes, now);
            let mask = match preselected
                .and_then(|next| classes.iter().position(|class| class.class_id == next.class_id))
            {
                Some(position) => SelectionMask::EMPTY.toggle(position),
                None => SelectionMask::EMPTY,
            };

            let keyboard =
                build_attendance_keyboard(&classes, self.tz.today(now), mask, &self.tz);
            let prompt = messages::attend_selection_prompt(if mask.is_empty() {
                None
            } else {
                preselected.map(|class| class.course_name.as_str())
            });
            return Ok(prompt.with_keyboard(keyboard));
        }

        let valid = filter_valid_indices(indices, classes.len());
        if valid.is_empty() {
            return Ok(messages::invalid_class_numbers());
        }

        let outcomes = self
            .marker
            .mark_by_indices(user_id, &classes, &valid, now)
            .await
            .map_err(service_error)?;
        Ok(messages::mark_summary(&outcomes))
    }

    async fn absent(&self, user_id: &UserId, indices: &[u32]) -> Result<Reply, CommandRouteError> {
        let classes = self.todays_classes(user_id).await.map_err(service_error)?;
        if classes.is_empty() {
            return Ok(messages::no_classes_today());
        }

        if indices.is_empty() {
            if classes.len() == 1 {
                self.marker
                    .absence_class(user_id, &classes[0])
                    .await
                    .map_err(service_error)?;
                return Ok(messages::single_absence(&classes[0].course_name));
            }

            let keyboard = build_attendance_keyboard(
                &classes,
                self.tz.today(Utc::now()),
                SelectionMask::EMPTY,
                &self.tz,
            );
            return Ok(messages::absent_selection_prompt().with_keyboard(keyboard));
        }

        let valid = filter_valid_indices(indices, classes.len());
        if valid.is_empty() {
            return Ok(messages::invalid_class_numbers());
        }

        let outcomes = self
            .marker
            .absence_by_indices(user_id, &classes, &valid)
            .await
            .map_err(service_error)?;
        Ok(messages::absence_summary(outcomes.len()))
    }

    async fn attend_all(&self, user_id: &UserId) -> Result<Reply, CommandRouteError> {
        let classes = self.todays_classes(user_id).await.map_err(service_error)?;
        if classes.is_empty() {
            return Ok(messages::no_classes_today());
        }

        let outcomes = self
            .marker
            .mark_all(user_id, &classes, Utc::now())
            .await
            .map_err(service_error)?;
        Ok(messages::mark_summary(&outcomes))
    }

    async fn absent_all(&self, user_id: &UserId) -> Result<Reply, CommandRouteError> {
        let classes = self.todays_classes(user_id).await.map_err(service_error)?;
        if classes.is_empty() {
            return Ok(messages::no_classes_today());
        }

        self.marker.absence_all(user_id, &classes).await.map_err(service_error)?;
        Ok(messages::absence_summary(classes.len()))
    }

    async fn today(&self, user_id: &UserId) -> Result<Reply, CommandRouteError> {
        let classes = self.todays_classes(user_id).await.map_err(service_error)?;
        if classes.is_empty() {
            return Ok(messages::no_classes_today());
        }

        let statuses = self.marked_flags(user_id, &classes).await.map_err(service_error)?;
        let title = format!("Today's Schedule ({})", self.tz.today(Utc::now()));
        Ok(messages::schedule_listing(&title, &classes, Some(&statuses), &self.tz))
    }

    async fn tomorrow(&self, user_id: &UserId) -> Result<Reply, CommandRouteError> {
        let date = self.tz.tomorrow(Utc::now());
        let classes = self.classes_for(user_id, date).await.map_err(service_error)?;
        if classes.is_empty() {
            return Ok(messages::no_classes_tomorrow());
        }

        let title = format!("Tomorrow's Schedule ({date})");
        Ok(messages::schedule_listing(&title, &classes, None, &self.tz))
    }

    async fn status(&self, user_id: &UserId) -> Result<Reply, CommandRouteError> {
        let courses = self
            .attendance
            .effective_course_attendance(user_id, self.tz.today(Utc::now()))
            .await
            .map_err(service_error)?;
        if courses.is_empty() {
            return Ok(messages::no_courses());
        }

        let summaries: Vec<CourseAttendanceSummary> =
            courses.into_iter().map(CourseAttendanceSummary::from).collect();
        Ok(messages::status_report(&summaries))
    }

    async fn undo(&self, user_id: &UserId) -> Result<Reply, CommandRouteError> {
        let outcome = self
            .undo
            .undo_last_action(user_id, Utc::now())
            .await
            .map_err(service_error)?;
        Ok(messages::undo_reply(&outcome))
    }

    async fn select_class(
        &self,
        user_id: &UserId,
        date: NaiveDate,
        index: usize,
        mask: SelectionMask,
    ) -> Result<CallbackOutcome, CommandRouteError> {
        let classes = self.classes_for(user_id, date).await.map_err(service_error)?;
        if classes.is_empty() {
            return Ok(CallbackOutcome::answer(messages::NO_CLASSES_FOUND_ANSWER));
        }
        // the payload index reflects an older keyboard render; the schedule
        // may have shrunk since
        if index >= classes.len() {
            return Ok(CallbackOutcome::answer(messages::INVALID_SELECTION_ANSWER));
        }

        let keyboard = build_attendance_keyboard(&classes, date, mask.toggle(index), &self.tz);
        Ok(CallbackOutcome::silent().with_edit(MessageEdit::Markup { keyboard }))
    }

    async fn confirm_selection(
        &self,
        user_id: &UserId,
        date: NaiveDate,
        kind: ActionKind,
        mask: SelectionMask,
    ) -> Result<CallbackOutcome, CommandRouteError> {
        let classes = self.classes_for(user_id, date).await.map_err(service_error)?;
        let indices = mask.to_indices(classes.len());
        if indices.is_empty() {
            return Ok(CallbackOutcome::alert(messages::NOTHING_SELECTED_ANSWER));
        }

        let text = match kind {
            ActionKind::Attend => {
                let outcomes = self
                    .marker
                    .mark_by_indices(user_id, &classes, &indices, Utc::now())
                    .await
                    .map_err(service_error)?;
                let marked =
                    outcomes.iter().filter(|o| o.status == MarkStatus::Marked).count();
                let already =
                    outcomes.iter().filter(|o| o.status == MarkStatus::Already).count();
                let failed =
                    outcomes.iter().filter(|o| o.status == MarkStatus::Failed).count();
                messages::confirm_attend_edit(indices.len(), marked, already, failed)
            }
            ActionKind::Absent => {
                self.marker
                    .absence_by_indices(user_id, &classes, &indices)
                    .await
                    .map_err(service_error)?;
                messages::confirm_absent_edit(indices.len())
            }
        };

        Ok(CallbackOutcome::silent().with_edit(MessageEdit::Text { text, markdown: true }))
    }

    async fn mark_all_from_callback(
        &self,
        user_id: &UserId,
        date: NaiveDate,
        kind: ActionKind,
    ) -> Result<CallbackOutcome, CommandRouteError> {
        let classes = self.classes_for(user_id, date).await.map_err(service_error)?;
        if classes.is_empty() {
            return Ok(CallbackOutcome::answer(messages::NO_CLASSES_FOUND_ANSWER));
        }

        let text = match kind {
            ActionKind::Attend => {
                let outcomes = self
                    .marker
                    .mark_all(user_id, &classes, Utc::now())
                    .await
                    .map_err(service_error)?;
                let marked =
                    outcomes.iter().filter(|o| o.status == MarkStatus::Marked).count();
                let already =
                    outcomes.iter().filter(|o| o.status == MarkStatus::Already).count();
                messages::attend_all_edit(classes.len(), marked, already)
            }
            ActionKind::Absent => {
                self.marker.absence_all(user_id, &classes).await.map_err(service_error)?;
                messages::absent_all_edit(classes.len())
            }
        };

        Ok(CallbackOutcome::silent().with_edit(MessageEdit::Text { text, markdown: true }))
    }
}
