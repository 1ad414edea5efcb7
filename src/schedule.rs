use chrono::{Datelike, Utc};
use chrono_tz::Tz;
use tracing::info;

use crate::context::CallContext;
use crate::models::{
    CategoryFilter, CategoryName, ClassInstance, ScheduleEntry, ScheduleView, Visibility, Weekday,
    WeeklyScheduleDay,
};
use crate::store::{InstanceQuery, ScheduleStore, StoreResult};

/// Weekday it currently is in `tz`.
pub fn current_weekday(tz: Tz) -> Weekday {
    Weekday::from_chrono(Utc::now().with_timezone(&tz).weekday())
}

/// Read side of the schedule: the public day view and the admin weekly grid.
#[derive(Clone)]
pub struct ScheduleService {
    store: ScheduleStore,
    public_visibility: Visibility,
}

impl ScheduleService {
    pub fn new(store: ScheduleStore, hide_deleted_in_public: bool) -> Self {
        let public_visibility = if hide_deleted_in_public {
            Visibility::ActiveOnly
        } else {
            Visibility::IncludeDeleted
        };
        Self {
            store,
            public_visibility,
        }
    }

    /// Classes running on `day` that match `category`, earliest first.
    pub async fn filter(
        &self,
        ctx: &CallContext,
        day: Weekday,
        category: CategoryFilter,
    ) -> StoreResult<ScheduleView> {
        let query = InstanceQuery::new(self.public_visibility)
            .weekday(day)
            .category(category.category());
        let classes = self.entries(&query).await?;

        info!(
            parent: ctx.span(),
            user = ctx.actor(),
            day = day.code(),
            category = category.as_str(),
            results = classes.len(),
            "schedule filtered"
        );

        Ok(ScheduleView {
            day,
            day_label: day.label().to_string(),
            category,
            classes,
        })
    }

    /// Every publicly visible class in the week matching `category`.
    pub async fn week(
        &self,
        ctx: &CallContext,
        category: CategoryFilter,
    ) -> StoreResult<Vec<ScheduleEntry>> {
        let query = InstanceQuery::new(self.public_visibility).category(category.category());
        let entries = self.entries(&query).await?;
        info!(
            parent: ctx.span(),
            user = ctx.actor(),
            category = category.as_str(),
            results = entries.len(),
            "weekly schedule exported"
        );
        Ok(entries)
    }

    /// Non-deleted classes grouped by weekday; all seven days are present.
    pub async fn weekly_grid(&self, ctx: &CallContext) -> StoreResult<Vec<WeeklyScheduleDay>> {
        let entries = self
            .entries(&InstanceQuery::new(Visibility::ActiveOnly))
            .await?;
        let total = entries.len();

        let mut grid: Vec<WeeklyScheduleDay> = Weekday::ALL
            .iter()
            .map(|day| WeeklyScheduleDay {
                day: *day,
                day_label: day.label().to_string(),
                classes: Vec::new(),
            })
            .collect();
        for entry in entries {
            let slot = usize::from(entry.weekday.code()) - 1;
            grid[slot].classes.push(entry);
        }

        info!(parent: ctx.span(), user = ctx.actor(), results = total, "weekly grid built");
        Ok(grid)
    }

    async fn entries(&self, query: &InstanceQuery) -> StoreResult<Vec<ScheduleEntry>> {
        let instances = self.store.list_instances(query).await?;

        let mut class_ids: Vec<i64> = instances.iter().map(|i| i.class_id).collect();
        class_ids.sort_unstable();
        class_ids.dedup();
        let categories = self.store.categories_for_classes(&class_ids).await?;

        let mut entries: Vec<ScheduleEntry> = instances
            .into_iter()
            .map(|instance| {
                let mut names: Vec<CategoryName> = categories
                    .get(&instance.class_id)
                    .map(|cats| cats.iter().map(|c| c.category).collect())
                    .unwrap_or_default();
                names.sort();
                names.dedup();
                to_entry(instance, names)
            })
            .collect();

        entries.sort_by(|a, b| {
            a.weekday
                .cmp(&b.weekday)
                .then(a.start_time.cmp(&b.start_time))
                .then(a.instance_id.cmp(&b.instance_id))
        });
        Ok(entries)
    }
}

fn to_entry(instance: ClassInstance, categories: Vec<CategoryName>) -> ScheduleEntry {
    ScheduleEntry {
        instance_id: instance.id,
        class_id: instance.class_id,
        class_name: instance.class_name,
        categories,
        weekday: instance.weekday,
        weekday_label: instance.weekday.label().to_string(),
        start_time: instance.start_time,
        end_time: instance.end_time,
        duration_min: instance.time_span,
        deleted: instance.deleted,
    }
}
