//! Write path for categories, classes and instances.
//!
//! Each mutation goes to the store first and is then recorded with an audit
//! log line naming the operation, the record and the acting user.

use tracing::info;

use crate::context::CallContext;
use crate::models::{
    CategoryInput, ClassCategory, ClassInput, ClassInstance, InstanceInput, TrainingClass,
    Visibility,
};
use crate::store::{InstanceQuery, ScheduleStore, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

fn audit(ctx: &CallContext, operation: Operation, entity: &'static str, record_id: i64) {
    info!(
        parent: ctx.span(),
        operation = operation.as_str(),
        entity,
        record_id,
        user = ctx.actor(),
        "ADMIN: {} {} {}",
        operation.as_str(),
        entity,
        record_id
    );
}

#[derive(Clone)]
pub struct AdminService {
    store: ScheduleStore,
}

impl AdminService {
    pub fn new(store: ScheduleStore) -> Self {
        Self { store }
    }

    pub async fn list_categories(&self) -> StoreResult<Vec<ClassCategory>> {
        self.store.list_categories().await
    }

    pub async fn create_category(
        &self,
        ctx: &CallContext,
        input: &CategoryInput,
    ) -> StoreResult<ClassCategory> {
        let category = self.store.create_category(input.category).await?;
        audit(ctx, Operation::Create, "category", category.id);
        Ok(category)
    }

    pub async fn update_category(
        &self,
        ctx: &CallContext,
        id: i64,
        input: &CategoryInput,
    ) -> StoreResult<ClassCategory> {
        let category = self.store.update_category(id, input.category).await?;
        audit(ctx, Operation::Update, "category", id);
        Ok(category)
    }

    pub async fn delete_category(&self, ctx: &CallContext, id: i64) -> StoreResult<()> {
        self.store.delete_category(id).await?;
        audit(ctx, Operation::Delete, "category", id);
        Ok(())
    }

    pub async fn list_classes(&self) -> StoreResult<Vec<TrainingClass>> {
        self.store.list_classes().await
    }

    pub async fn create_class(
        &self,
        ctx: &CallContext,
        input: &ClassInput,
    ) -> StoreResult<TrainingClass> {
        let class = self.store.create_class(input).await?;
        audit(ctx, Operation::Create, "class", class.id);
        Ok(class)
    }

    pub async fn update_class(
        &self,
        ctx: &CallContext,
        id: i64,
        input: &ClassInput,
    ) -> StoreResult<TrainingClass> {
        let class = self.store.update_class(id, input).await?;
        audit(ctx, Operation::Update, "class", id);
        Ok(class)
    }

    /// Removes the class together with all of its instances.
    pub async fn delete_class(&self, ctx: &CallContext, id: i64) -> StoreResult<()> {
        self.store.delete_class(id).await?;
        audit(ctx, Operation::Delete, "class", id);
        Ok(())
    }

    pub async fn list_instances(&self) -> StoreResult<Vec<ClassInstance>> {
        self.store
            .list_instances(&InstanceQuery::new(Visibility::IncludeDeleted))
            .await
    }

    pub async fn create_instance(
        &self,
        ctx: &CallContext,
        input: &InstanceInput,
    ) -> StoreResult<ClassInstance> {
        let instance = self.store.create_instance(input).await?;
        audit(ctx, Operation::Create, "instance", instance.id);
        Ok(instance)
    }

    pub async fn update_instance(
        &self,
        ctx: &CallContext,
        id: i64,
        input: &InstanceInput,
    ) -> StoreResult<ClassInstance> {
        let instance = self.store.update_instance(id, input).await?;
        audit(ctx, Operation::Update, "instance", id);
        Ok(instance)
    }

    pub async fn delete_instance(&self, ctx: &CallContext, id: i64) -> StoreResult<()> {
        self.store.delete_instance(id).await?;
        audit(ctx, Operation::Delete, "instance", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::models::{CategoryName, Weekday};
    use crate::store::StoreError;
    use crate::store::tests::{class_input, memory_store, slot};

    #[tokio::test]
    async fn test_instance_lifecycle() {
        let admin = AdminService::new(memory_store().await);
        let ctx = CallContext::new("admin");

        let category = admin
            .create_category(&ctx, &CategoryInput { category: CategoryName::Grappling })
            .await
            .unwrap();
        let class = admin
            .create_class(&ctx, &class_input("Wrestling", vec![category.id]))
            .await
            .unwrap();
        let instance = admin
            .create_instance(&ctx, &slot(class.id, Weekday::Thursday, (17, 0), (18, 0)))
            .await
            .unwrap();

        let mut moved = slot(class.id, Weekday::Thursday, (17, 30), (18, 45));
        moved.time_span = Some(75);
        let updated = admin.update_instance(&ctx, instance.id, &moved).await.unwrap();
        assert_eq!(updated.start_time, NaiveTime::from_hms_opt(17, 30, 0).unwrap());
        assert_eq!(updated.time_span, 75);
        assert!(updated.updated >= instance.updated);

        admin.delete_instance(&ctx, instance.id).await.unwrap();
        assert!(admin.list_instances().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_records() {
        let admin = AdminService::new(memory_store().await);
        let ctx = CallContext::new("admin");

        let err = admin
            .update_category(&ctx, 5, &CategoryInput { category: CategoryName::Fitness })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "category", .. }));

        let err = admin.delete_class(&ctx, 5).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "class", .. }));

        let err = admin
            .update_instance(&ctx, 5, &slot(1, Weekday::Monday, (6, 0), (7, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "instance", .. }));
    }

    #[tokio::test]
    async fn test_soft_delete_class_through_update() {
        let admin = AdminService::new(memory_store().await);
        let ctx = CallContext::new("admin");
        let class = admin
            .create_class(&ctx, &class_input("Pilates", vec![]))
            .await
            .unwrap();

        let mut input = class_input("Pilates", vec![]);
        input.deleted = true;
        let updated = admin.update_class(&ctx, class.id, &input).await.unwrap();
        assert!(updated.deleted);
        assert_eq!(admin.list_classes().await.unwrap().len(), 1);
    }
}
