use sea_query::{ColumnDef, ColumnType, Expr as SeaExpr, Iden, Index, Order as SeaOrder, PostgresQueryBuilder, Query as SeaQuery, SimpleExpr, Table};
use sea_query_binder::SqlxBinder;
use sqlx::{Error as DbError, Row, postgres::PgRow};

use crate::{
    Result,
    store::{
        DbCollection, SaveMode, data,
        db::postgres::{DbInit, DbRow},
    },
};

use super::{DbConnection, map_db_err};

pub struct NodeCollection {
    conn: DbConnection,
}

#[derive(Iden)]
#[iden = "nodes"]
enum CollectionIden {
    Table,

    Name,
    NodeIndex,
    MomModtime,
    Hostname,
    Ntype,
    State,
    Pque,
    Attributes,
}

const COLUMNS: [CollectionIden; 8] = [
    CollectionIden::Name,
    CollectionIden::NodeIndex,
    CollectionIden::MomModtime,
    CollectionIden::Hostname,
    CollectionIden::Ntype,
    CollectionIden::State,
    CollectionIden::Pque,
    CollectionIden::Attributes,
];

impl DbCollection for NodeCollection {
    type Item = data::DbNode;

    fn find(
        &self,
        id: &str,
    ) -> Result<Option<Self::Item>> {
        let (sql, values) =
            SeaQuery::select().from(CollectionIden::Table).columns(COLUMNS).and_where(SeaExpr::col(CollectionIden::Name).eq(id)).build_sqlx(PostgresQueryBuilder);

        match self.conn.query_one(&sql, values).map_err(map_db_err)? {
            Some(row) => Ok(Some(Self::Item::from_row(&row).map_err(map_db_err)?)),
            None => Ok(None),
        }
    }

    fn ids(&self) -> Result<Vec<String>> {
        let (sql, values) = SeaQuery::select()
            .from(CollectionIden::Table)
            .column(CollectionIden::Name)
            .order_by(CollectionIden::NodeIndex, SeaOrder::Asc)
            .order_by(CollectionIden::Name, SeaOrder::Asc)
            .build_sqlx(PostgresQueryBuilder);

        let rows = self.conn.query(&sql, values).map_err(map_db_err)?;
        rows.iter().map(|row| row.try_get::<String, _>("name").map_err(map_db_err)).collect()
    }

    fn save(
        &self,
        data: &Self::Item,
        mode: SaveMode,
    ) -> Result<bool> {
        let model = data.clone();
        let (sql, sql_values) = match mode {
            SaveMode::InsertNew => SeaQuery::insert()
                .into_table(CollectionIden::Table)
                .columns(COLUMNS)
                .values([
                    model.name.into(),
                    model.index.into(),
                    model.mom_modtime.into(),
                    model.hostname.into(),
                    model.ntype.into(),
                    model.state.into(),
                    model.pque.into(),
                    model.attributes.into(),
                ])
                .map_err(map_db_err)?
                .build_sqlx(PostgresQueryBuilder),
            SaveMode::UpdateFull | SaveMode::UpdateQuick => {
                let mut values: Vec<(CollectionIden, SimpleExpr)> = vec![
                    (CollectionIden::NodeIndex, model.index.into()),
                    (CollectionIden::MomModtime, model.mom_modtime.into()),
                    (CollectionIden::Hostname, model.hostname.into()),
                    (CollectionIden::Ntype, model.ntype.into()),
                    (CollectionIden::State, model.state.into()),
                    (CollectionIden::Pque, model.pque.into()),
                ];
                if mode == SaveMode::UpdateFull {
                    values.push((CollectionIden::Attributes, model.attributes.into()));
                }
                SeaQuery::update()
                    .table(CollectionIden::Table)
                    .values(values)
                    .and_where(SeaExpr::col(CollectionIden::Name).eq(data.name.as_str()))
                    .build_sqlx(PostgresQueryBuilder)
            }
        };

        let result = self.conn.execute(sql.as_str(), sql_values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        let (sql, values) =
            SeaQuery::delete().from_table(CollectionIden::Table).and_where(SeaExpr::col(CollectionIden::Name).eq(id)).build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

impl DbRow for data::DbNode {
    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized,
    {
        Ok(Self {
            name: row.try_get("name")?,
            index: row.try_get("node_index")?,
            mom_modtime: row.try_get("mom_modtime")?,
            hostname: row.try_get("hostname")?,
            ntype: row.try_get("ntype")?,
            state: row.try_get("state")?,
            pque: row.try_get("pque")?,
            attributes: row.try_get("attributes")?,
        })
    }
}

impl DbInit for NodeCollection {
    fn init(&self) -> Result<()> {
        let sql = [
            Table::create()
                .table(CollectionIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(CollectionIden::Name).string().not_null().primary_key())
                .col(ColumnDef::new(CollectionIden::NodeIndex).integer().not_null().default(0))
                .col(ColumnDef::new(CollectionIden::MomModtime).big_integer().not_null().default(0))
                .col(ColumnDef::new(CollectionIden::Hostname).string().not_null().default(""))
                .col(ColumnDef::new(CollectionIden::Ntype).integer().not_null().default(0))
                .col(ColumnDef::new(CollectionIden::State).integer().not_null().default(0))
                .col(ColumnDef::new(CollectionIden::Pque).string().not_null().default(""))
                .col(ColumnDef::new(CollectionIden::Attributes).array(ColumnType::Text).not_null())
                .build(PostgresQueryBuilder),
            Index::create().name("idx_nodes_index").if_not_exists().table(CollectionIden::Table).col(CollectionIden::NodeIndex).build(PostgresQueryBuilder),
        ];

        self.conn.batch_execute(&sql).map_err(map_db_err)
    }
}

impl NodeCollection {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
        }
    }
}
