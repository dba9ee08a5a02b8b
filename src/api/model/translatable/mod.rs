//! Translatable catalog content: the `TranslatableItem` union, the
//! `TranslatableKinds` enum and loading items of one kind from the DB.

use juniper::{GraphQLEnum, GraphQLObject, GraphQLUnion};

use crate::{
    api::{
        Context, Id,
        err::ApiResult,
        pagination::{self, Page, PageArgs, PageInfo, RowSource, SortType},
    },
    auth::Permission,
    db::{Transaction, util::FromDb},
    model::Key,
};

mod content;

pub(crate) use self::content::*;


/// The kinds of objects that can be translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, GraphQLEnum)]
#[graphql(name = "TranslatableKinds")]
pub(crate) enum TranslatableKind {
    Attribute,
    AttributeValue,
    Category,
    Collection,
    MenuItem,
    Page,
    Product,
    Sale,
    ShippingMethod,
    #[graphql(name = "VARIANT")]
    ProductVariant,
    Voucher,
}

impl TranslatableKind {
    pub(crate) const ALL: &'static [Self] = &[
        Self::Attribute,
        Self::AttributeValue,
        Self::Category,
        Self::Collection,
        Self::MenuItem,
        Self::Page,
        Self::Product,
        Self::Sale,
        Self::ShippingMethod,
        Self::ProductVariant,
        Self::Voucher,
    ];

    /// The type tag used in global IDs of items of this kind.
    pub(crate) const fn type_name(self) -> &'static str {
        match self {
            Self::Attribute => "Attribute",
            Self::AttributeValue => "AttributeValue",
            Self::Category => "Category",
            Self::Collection => "Collection",
            Self::MenuItem => "MenuItem",
            Self::Page => "Page",
            Self::Product => "Product",
            Self::Sale => "Sale",
            Self::ShippingMethod => "ShippingMethod",
            Self::ProductVariant => "ProductVariant",
            Self::Voucher => "Voucher",
        }
    }

    /// The table storing items of this kind and its default order.
    pub(crate) const fn source(self) -> RowSource {
        let (table, sort_column, sort_type) = match self {
            Self::Attribute => ("attributes", "slug", SortType::Text),
            Self::AttributeValue => ("attribute_values", "sort_order", SortType::Int),
            Self::Category => ("categories", "slug", SortType::Text),
            Self::Collection => ("collections", "slug", SortType::Text),
            Self::MenuItem => ("menu_items", "sort_order", SortType::Int),
            Self::Page => ("pages", "slug", SortType::Text),
            Self::Product => ("products", "slug", SortType::Text),
            Self::Sale => ("sales", "name", SortType::Text),
            Self::ShippingMethod => ("shipping_methods", "id", SortType::Int),
            Self::ProductVariant => ("product_variants", "sort_order", SortType::Int),
            Self::Voucher => ("vouchers", "code", SortType::Text),
        };
        RowSource { table, sort_column, sort_type }
    }
}

/// Implemented by all `*TranslatableContent` types.
pub(crate) trait Translatable: FromDb + Into<TranslatableItem> {
    const KIND: TranslatableKind;
}


#[derive(GraphQLUnion)]
#[graphql(Context = Context)]
pub(crate) enum TranslatableItem {
    Product(ProductTranslatableContent),
    Collection(CollectionTranslatableContent),
    Category(CategoryTranslatableContent),
    Attribute(AttributeTranslatableContent),
    AttributeValue(AttributeValueTranslatableContent),
    ProductVariant(ProductVariantTranslatableContent),
    Page(PageTranslatableContent),
    ShippingMethod(ShippingMethodTranslatableContent),
    Sale(SaleTranslatableContent),
    Voucher(VoucherTranslatableContent),
    MenuItem(MenuItemTranslatableContent),
}

#[derive(GraphQLObject)]
#[graphql(Context = Context)]
pub(crate) struct TranslatableItemConnection {
    pub(crate) edges: Vec<TranslatableItemEdge>,
    pub(crate) page_info: PageInfo,
    pub(crate) total_count: i32,
}

#[derive(GraphQLObject)]
#[graphql(Context = Context)]
pub(crate) struct TranslatableItemEdge {
    pub(crate) node: TranslatableItem,
    pub(crate) cursor: String,
}

impl From<Page<TranslatableItem>> for TranslatableItemConnection {
    fn from(page: Page<TranslatableItem>) -> Self {
        Self {
            edges: page.items.into_iter()
                .map(|(node, cursor)| TranslatableItemEdge { node, cursor: cursor.encode() })
                .collect(),
            page_info: page.page_info,
            total_count: page.total_count,
        }
    }
}

impl TranslatableItem {
    #[cfg(test)]
    fn kind(&self) -> TranslatableKind {
        match self {
            Self::Product(_) => TranslatableKind::Product,
            Self::Collection(_) => TranslatableKind::Collection,
            Self::Category(_) => TranslatableKind::Category,
            Self::Attribute(_) => TranslatableKind::Attribute,
            Self::AttributeValue(_) => TranslatableKind::AttributeValue,
            Self::ProductVariant(_) => TranslatableKind::ProductVariant,
            Self::Page(_) => TranslatableKind::Page,
            Self::ShippingMethod(_) => TranslatableKind::ShippingMethod,
            Self::Sale(_) => TranslatableKind::Sale,
            Self::Voucher(_) => TranslatableKind::Voucher,
            Self::MenuItem(_) => TranslatableKind::MenuItem,
        }
    }

    /// Loads one page of items of the given kind.
    pub(crate) async fn load_page(
        kind: TranslatableKind,
        args: PageArgs,
        context: &Context,
    ) -> ApiResult<TranslatableItemConnection> {
        let token = context.require_permission(Permission::ManageTranslations)?;
        let db = context.db(token);
        let req = args.validate("translations", kind.source().sort_type)?;

        let page = match kind {
            TranslatableKind::Product => page_of::<ProductTranslatableContent>(db, &req).await?,
            TranslatableKind::Collection => page_of::<CollectionTranslatableContent>(db, &req).await?,
            TranslatableKind::Category => page_of::<CategoryTranslatableContent>(db, &req).await?,
            TranslatableKind::Attribute => page_of::<AttributeTranslatableContent>(db, &req).await?,
            TranslatableKind::AttributeValue => {
                page_of::<AttributeValueTranslatableContent>(db, &req).await?
            }
            TranslatableKind::ProductVariant => {
                page_of::<ProductVariantTranslatableContent>(db, &req).await?
            }
            TranslatableKind::Page => page_of::<PageTranslatableContent>(db, &req).await?,
            TranslatableKind::ShippingMethod => {
                page_of::<ShippingMethodTranslatableContent>(db, &req).await?
            }
            TranslatableKind::Sale => page_of::<SaleTranslatableContent>(db, &req).await?,
            TranslatableKind::Voucher => page_of::<VoucherTranslatableContent>(db, &req).await?,
            TranslatableKind::MenuItem => page_of::<MenuItemTranslatableContent>(db, &req).await?,
        };

        Ok(page.into())
    }

    /// Loads the item with the given ID, or `None` if the ID belongs to
    /// another kind or no such item exists.
    pub(crate) async fn load_by_id(
        id: Id,
        kind: TranslatableKind,
        context: &Context,
    ) -> ApiResult<Option<Self>> {
        let token = context.require_permission(Permission::ManageTranslations)?;
        let Some(key) = id.decode()?.key_for(kind.type_name()) else {
            return Ok(None);
        };

        Self::load_by_key(key, kind, context.db(token)).await
    }

    async fn load_by_key(
        key: Key,
        kind: TranslatableKind,
        db: &Transaction,
    ) -> ApiResult<Option<Self>> {
        match kind {
            TranslatableKind::Product => one_of::<ProductTranslatableContent>(db, key).await,
            TranslatableKind::Collection => one_of::<CollectionTranslatableContent>(db, key).await,
            TranslatableKind::Category => one_of::<CategoryTranslatableContent>(db, key).await,
            TranslatableKind::Attribute => one_of::<AttributeTranslatableContent>(db, key).await,
            TranslatableKind::AttributeValue => {
                one_of::<AttributeValueTranslatableContent>(db, key).await
            }
            TranslatableKind::ProductVariant => {
                one_of::<ProductVariantTranslatableContent>(db, key).await
            }
            TranslatableKind::Page => one_of::<PageTranslatableContent>(db, key).await,
            TranslatableKind::ShippingMethod => {
                one_of::<ShippingMethodTranslatableContent>(db, key).await
            }
            TranslatableKind::Sale => one_of::<SaleTranslatableContent>(db, key).await,
            TranslatableKind::Voucher => one_of::<VoucherTranslatableContent>(db, key).await,
            TranslatableKind::MenuItem => one_of::<MenuItemTranslatableContent>(db, key).await,
        }
    }
}

async fn page_of<T: Translatable>(
    db: &Transaction,
    req: &pagination::PageRequest,
) -> ApiResult<Page<TranslatableItem>> {
    let page = pagination::load_page::<T>(db, &T::KIND.source(), req).await?;
    Ok(page.map(Into::into))
}

async fn one_of<T: Translatable>(db: &Transaction, key: Key) -> ApiResult<Option<TranslatableItem>> {
    let query = format!("select {} from {} where id = $1", T::COLUMNS, T::KIND.source().table);
    let item = db.query_opt_mapped::<T>(&query, &[&key]).await?;
    Ok(item.map(Into::into))
}


#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use super::*;

    #[test]
    fn each_variant_has_its_own_kind() {
        let items: Vec<TranslatableItem> = vec![
            ProductTranslatableContent::dummy(1).into(),
            CollectionTranslatableContent::dummy(1).into(),
            CategoryTranslatableContent::dummy(1).into(),
            AttributeTranslatableContent::dummy(1).into(),
            AttributeValueTranslatableContent::dummy(1).into(),
            ProductVariantTranslatableContent::dummy(1).into(),
            PageTranslatableContent::dummy(1).into(),
            ShippingMethodTranslatableContent::dummy(1).into(),
            SaleTranslatableContent::dummy(1).into(),
            VoucherTranslatableContent::dummy(1).into(),
            MenuItemTranslatableContent::dummy(1).into(),
        ];

        let kinds = items.iter().map(TranslatableItem::kind).collect::<HashSet<_>>();
        assert_eq!(kinds.len(), TranslatableKind::ALL.len());
    }

    #[test]
    fn content_kinds_match() {
        assert_eq!(ProductTranslatableContent::KIND, TranslatableKind::Product);
        assert_eq!(ProductVariantTranslatableContent::KIND, TranslatableKind::ProductVariant);
        assert_eq!(MenuItemTranslatableContent::KIND, TranslatableKind::MenuItem);
        assert_eq!(VoucherTranslatableContent::KIND, TranslatableKind::Voucher);
    }

    #[test]
    fn type_names_are_unique() {
        let names = TranslatableKind::ALL.iter()
            .map(|k| k.type_name())
            .collect::<HashSet<_>>();
        assert_eq!(names.len(), TranslatableKind::ALL.len());
        assert_eq!(TranslatableKind::ProductVariant.type_name(), "ProductVariant");
    }

    #[test]
    fn sources() {
        let voucher = TranslatableKind::Voucher.source();
        assert_eq!((voucher.table, voucher.sort_column), ("vouchers", "code"));
        assert_eq!(voucher.sort_type, SortType::Text);

        let menu_item = TranslatableKind::MenuItem.source();
        assert_eq!(menu_item.table, "menu_items");
        assert_eq!(menu_item.sort_type, SortType::Int);

        let tables = TranslatableKind::ALL.iter()
            .map(|k| k.source().table)
            .collect::<HashSet<_>>();
        assert_eq!(tables.len(), TranslatableKind::ALL.len());
    }
}
