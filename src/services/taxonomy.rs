use crate::{
    db::{run_in_transaction, DbPool, TransactionOptions},
    entities::{brand, brand_part_type, equipment_type, part_type},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use validator::Validate;

const MAX_NAME_LEN: usize = 120;

/// Row of any of the name-only reference tables
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaxonomyEntry {
    pub id: i32,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "fecha_creacion")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTaxonomyEntryRequest {
    #[serde(rename = "nombre")]
    #[validate(length(min = 1, max = 120, message = "nombre must be between 1 and 120 characters"))]
    pub name: String,
}

impl From<brand::Model> for TaxonomyEntry {
    fn from(m: brand::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            created_at: m.created_at,
        }
    }
}

impl From<part_type::Model> for TaxonomyEntry {
    fn from(m: part_type::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            created_at: m.created_at,
        }
    }
}

impl From<equipment_type::Model> for TaxonomyEntry {
    fn from(m: equipment_type::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            created_at: m.created_at,
        }
    }
}

fn normalize_name<'a>(kind: &str, raw: &'a str) -> Result<&'a str, ServiceError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "{} name must not be empty",
            kind
        )));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ServiceError::ValidationError(format!(
            "{} name must be at most {} characters",
            kind, MAX_NAME_LEN
        )));
    }
    Ok(name)
}

/// Returns the id of the brand named exactly `name`, inserting it if absent.
///
/// Runs on whatever connection it is given, so a composite write can call it
/// with its own transaction.
pub async fn find_or_create_brand<C>(conn: &C, name: &str) -> Result<i32, ServiceError>
where
    C: ConnectionTrait,
{
    let name = normalize_name("brand", name)?;
    if let Some(existing) = brand::Entity::find()
        .filter(brand::Column::Name.eq(name))
        .one(conn)
        .await?
    {
        return Ok(existing.id);
    }

    brand::Entity::insert(brand::ActiveModel {
        name: Set(name.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    })
    .on_conflict(OnConflict::column(brand::Column::Name).do_nothing().to_owned())
    .exec_without_returning(conn)
    .await?;

    let created = brand::Entity::find()
        .filter(brand::Column::Name.eq(name))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::InternalError(format!("brand '{}' vanished after insert", name)))?;
    debug!(brand_id = created.id, name = %name, "Brand created on demand");
    Ok(created.id)
}

/// Equipment-type counterpart of [`find_or_create_brand`].
pub async fn find_or_create_equipment_type<C>(conn: &C, name: &str) -> Result<i32, ServiceError>
where
    C: ConnectionTrait,
{
    let name = normalize_name("equipment type", name)?;
    if let Some(existing) = equipment_type::Entity::find()
        .filter(equipment_type::Column::Name.eq(name))
        .one(conn)
        .await?
    {
        return Ok(existing.id);
    }

    equipment_type::Entity::insert(equipment_type::ActiveModel {
        name: Set(name.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::column(equipment_type::Column::Name)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;

    let created = equipment_type::Entity::find()
        .filter(equipment_type::Column::Name.eq(name))
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!("equipment type '{}' vanished after insert", name))
        })?;
    debug!(equipment_type_id = created.id, name = %name, "Equipment type created on demand");
    Ok(created.id)
}

/// Reference tables: brands, part types and equipment types
#[derive(Clone)]
pub struct TaxonomyService {
    db: Arc<DbPool>,
    tx_options: TransactionOptions,
}

impl TaxonomyService {
    pub fn new(db: Arc<DbPool>, tx_options: TransactionOptions) -> Self {
        Self { db, tx_options }
    }

    #[instrument(skip(self))]
    pub async fn list_brands(&self) -> Result<Vec<TaxonomyEntry>, ServiceError> {
        let rows = brand::Entity::find()
            .order_by_asc(brand::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, request))]
    pub async fn create_brand(
        &self,
        request: CreateTaxonomyEntryRequest,
    ) -> Result<TaxonomyEntry, ServiceError> {
        request.validate()?;
        let name = normalize_name("brand", &request.name)?.to_string();
        let created = brand::ActiveModel {
            name: Set(name.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(|e| ServiceError::from_write(e, || format!("Brand '{}' already exists", name)))?;

        info!(brand_id = created.id, "Brand created");
        Ok(created.into())
    }

    #[instrument(skip(self))]
    pub async fn list_part_types(&self) -> Result<Vec<TaxonomyEntry>, ServiceError> {
        let rows = part_type::Entity::find()
            .order_by_asc(part_type::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Creates a part type and offers it for every existing brand.
    #[instrument(skip(self, request))]
    pub async fn create_part_type(
        &self,
        request: CreateTaxonomyEntryRequest,
    ) -> Result<TaxonomyEntry, ServiceError> {
        request.validate()?;
        let name = normalize_name("part type", &request.name)?.to_string();

        let (created, linked) = run_in_transaction(&self.db, &self.tx_options, |txn| {
            Box::pin(async move {
                let created = part_type::ActiveModel {
                    name: Set(name.clone()),
                    created_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(txn)
                .await
                .map_err(|e| {
                    ServiceError::from_write(e, || format!("Part type '{}' already exists", name))
                })?;

                let brand_ids: Vec<i32> = brand::Entity::find()
                    .select_only()
                    .column(brand::Column::Id)
                    .into_tuple()
                    .all(txn)
                    .await?;

                let links: Vec<brand_part_type::ActiveModel> = brand_ids
                    .iter()
                    .map(|brand_id| brand_part_type::ActiveModel {
                        brand_id: Set(*brand_id),
                        part_type_id: Set(created.id),
                    })
                    .collect();
                if !links.is_empty() {
                    brand_part_type::Entity::insert_many(links)
                        .exec_without_returning(txn)
                        .await?;
                }

                Ok((created, brand_ids.len()))
            })
        })
        .await?;

        info!(part_type_id = created.id, linked_brands = linked, "Part type created");
        Ok(created.into())
    }

    #[instrument(skip(self))]
    pub async fn list_equipment_types(&self) -> Result<Vec<TaxonomyEntry>, ServiceError> {
        let rows = equipment_type::Entity::find()
            .order_by_asc(equipment_type::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, request))]
    pub async fn create_equipment_type(
        &self,
        request: CreateTaxonomyEntryRequest,
    ) -> Result<TaxonomyEntry, ServiceError> {
        request.validate()?;
        let name = normalize_name("equipment type", &request.name)?.to_string();
        let created = equipment_type::ActiveModel {
            name: Set(name.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            ServiceError::from_write(e, || format!("Equipment type '{}' already exists", name))
        })?;

        info!(equipment_type_id = created.id, "Equipment type created");
        Ok(created.into())
    }

    /// Part types offered for `brand_id`
    #[instrument(skip(self))]
    pub async fn part_types_for_brand(
        &self,
        brand_id: i32,
    ) -> Result<Vec<TaxonomyEntry>, ServiceError> {
        let db = &*self.db;
        let brand = brand::Entity::find_by_id(brand_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Brand", brand_id))?;
        let rows = part_type::Entity::find()
            .inner_join(brand::Entity)
            .filter(brand::Column::Id.eq(brand.id))
            .order_by_asc(part_type::Column::Name)
            .all(db)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use assert_matches::assert_matches;
    use sea_orm::{ModelTrait, PaginatorTrait};

    async fn setup() -> Arc<DbPool> {
        let db = establish_connection_with_config(&DbConfig::in_memory_sqlite())
            .await
            .unwrap();
        run_migrations(&db).await.unwrap();
        Arc::new(db)
    }

    fn named(name: &str) -> CreateTaxonomyEntryRequest {
        CreateTaxonomyEntryRequest {
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn find_or_create_is_idempotent() {
        let db = setup().await;
        let first = find_or_create_brand(&*db, "Samsung").await.unwrap();
        let second = find_or_create_brand(&*db, "  Samsung ").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(brand::Entity::find().count(&*db).await.unwrap(), 1);

        let tablet = find_or_create_equipment_type(&*db, "Tablet").await.unwrap();
        assert_eq!(
            find_or_create_equipment_type(&*db, "Tablet").await.unwrap(),
            tablet
        );
    }

    #[tokio::test]
    async fn find_or_create_rejects_blank_names() {
        let db = setup().await;
        assert_matches!(
            find_or_create_brand(&*db, "   ").await,
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            find_or_create_equipment_type(&*db, "").await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn new_part_type_is_linked_to_every_brand() {
        let db = setup().await;
        let service = TaxonomyService::new(db.clone(), TransactionOptions::default());
        let apple = service.create_brand(named("Apple")).await.unwrap();
        let lg = service.create_brand(named("LG")).await.unwrap();

        let screen = service.create_part_type(named("Pantalla")).await.unwrap();

        assert_eq!(
            brand_part_type::Entity::find()
                .filter(brand_part_type::Column::PartTypeId.eq(screen.id))
                .count(&*db)
                .await
                .unwrap(),
            2
        );
        for brand_id in [apple.id, lg.id] {
            let offered = service.part_types_for_brand(brand_id).await.unwrap();
            assert_eq!(offered.len(), 1);
            assert_eq!(offered[0].name, "Pantalla");
        }
    }

    #[tokio::test]
    async fn link_rows_resolve_both_sides() {
        let db = setup().await;
        let service = TaxonomyService::new(db.clone(), TransactionOptions::default());
        service.create_brand(named("Huawei")).await.unwrap();
        service.create_part_type(named("Flex")).await.unwrap();

        let with_brand = brand_part_type::Entity::find()
            .find_also_related(brand::Entity)
            .all(&*db)
            .await
            .unwrap();
        assert_eq!(with_brand.len(), 1);
        assert_eq!(with_brand[0].1.as_ref().map(|b| b.name.as_str()), Some("Huawei"));

        let with_type = brand_part_type::Entity::find()
            .find_also_related(part_type::Entity)
            .all(&*db)
            .await
            .unwrap();
        assert_eq!(with_type[0].1.as_ref().map(|t| t.name.as_str()), Some("Flex"));

        let brand = brand::Entity::find().one(&*db).await.unwrap().unwrap();
        let links = brand
            .find_related(brand_part_type::Entity)
            .all(&*db)
            .await
            .unwrap();
        assert_eq!(links.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let db = setup().await;
        let service = TaxonomyService::new(db, TransactionOptions::default());
        service.create_brand(named("Nokia")).await.unwrap();
        assert_matches!(
            service.create_brand(named("Nokia")).await,
            Err(ServiceError::Conflict(_))
        );
        service.create_part_type(named("Bateria")).await.unwrap();
        assert_matches!(
            service.create_part_type(named("Bateria")).await,
            Err(ServiceError::Conflict(_))
        );
    }
}
