use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    ai::{RecognizedProduct, SearchInterpretation},
    dto::{
        admin::{DashboardStats, InventoryAdjustRequest, LowStockQuery, UpdateOrderStatusRequest},
        ai::{AiSearchRequest, AiSearchResponse, AiUploadForm, AiUploadResponse},
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{
            AddToCartRequest, CartItemDto, CartList, CartSummary, GuestCartLine,
            MergeCartRequest, MergeCartResponse, UpdateCartItemRequest,
        },
        contact::{ContactList, ContactRequest},
        coupons::{CouponList, CouponPreview, CreateCouponRequest, ValidateCouponRequest},
        orders::{CheckoutRequest, OrderList, OrderWithItems, PayOrderRequest},
        products::{
            CategoryList, CompareRequest, CreateCategoryRequest, CreateProductRequest,
            ProductDetail, ProductList, UpdateProductRequest,
        },
        seller::{
            OnboardingComplete, SellerDashboard, SellerOrderLine, SellerOrderList,
            StartOnboardingRequest,
        },
        wishlist::{AddWishlistRequest, WishlistProductList},
    },
    models::{
        CartItem, Category, ContactSubmission, Coupon, Order, OrderItem, Product, SellerProfile,
        User, WishlistItem,
    },
    pricing::ShippingMethod,
    response::{ApiResponse, Meta},
    routes::{
        admin, ai, auth, cart, contact, coupons, health, orders, params, products, seller,
        wishlist,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::current_user,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::compare_products,
        products::list_categories,
        products::create_category,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_quantity,
        cart::remove_from_cart,
        cart::clear_cart,
        cart::merge_cart,
        wishlist::list_wishlist,
        wishlist::add_to_wishlist,
        wishlist::remove_from_wishlist,
        wishlist::move_to_cart,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        orders::pay_order,
        orders::cancel_order,
        coupons::validate_coupon,
        coupons::list_coupons,
        coupons::create_coupon,
        coupons::deactivate_coupon,
        seller::start_onboarding,
        seller::complete_onboarding,
        seller::get_profile,
        seller::seller_dashboard,
        seller::list_seller_orders,
        ai::ai_search,
        ai::recognize_product,
        ai::ai_upload_product,
        contact::submit_contact,
        admin::dashboard_stats,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_low_stock,
        admin::adjust_inventory,
        admin::list_contact_submissions
    ),
    components(
        schemas(
            User,
            Product,
            Category,
            CartItem,
            WishlistItem,
            Order,
            OrderItem,
            Coupon,
            SellerProfile,
            ContactSubmission,
            ShippingMethod,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateProductRequest,
            UpdateProductRequest,
            ProductDetail,
            ProductList,
            CompareRequest,
            CreateCategoryRequest,
            CategoryList,
            AddToCartRequest,
            UpdateCartItemRequest,
            GuestCartLine,
            MergeCartRequest,
            MergeCartResponse,
            CartItemDto,
            CartSummary,
            CartList,
            AddWishlistRequest,
            WishlistProductList,
            CheckoutRequest,
            PayOrderRequest,
            OrderList,
            OrderWithItems,
            ValidateCouponRequest,
            CouponPreview,
            CreateCouponRequest,
            CouponList,
            StartOnboardingRequest,
            OnboardingComplete,
            SellerDashboard,
            SellerOrderLine,
            SellerOrderList,
            AiSearchRequest,
            AiSearchResponse,
            AiUploadForm,
            AiUploadResponse,
            SearchInterpretation,
            RecognizedProduct,
            ContactRequest,
            ContactList,
            UpdateOrderStatusRequest,
            InventoryAdjustRequest,
            LowStockQuery,
            DashboardStats,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login and current user"),
        (name = "Products", description = "Catalogue browsing and seller product management"),
        (name = "Categories", description = "Product categories"),
        (name = "Cart", description = "Shopping cart, including guest cart merge"),
        (name = "Wishlist", description = "Saved products"),
        (name = "Orders", description = "Checkout, payment and order history"),
        (name = "Coupons", description = "Discount codes"),
        (name = "Seller", description = "Seller onboarding and sales"),
        (name = "AI", description = "Natural language search and photo recognition"),
        (name = "Contact", description = "Contact form"),
        (name = "Admin", description = "Merchant console"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
