//! Demo marketplace loaded into a fresh store.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::models::{
    Booking, BookingStatus, Category, Customer, Earning, GeoPoint, Message, PayoutStatus,
    PricingModel, Provider, Quote, QuoteItem, RequestType, Review, Service, VettingStatus,
};
use crate::pricing::Money;

pub struct Dataset {
    pub categories: Vec<Category>,
    pub providers: Vec<Provider>,
    pub customers: Vec<Customer>,
    pub bookings: Vec<Booking>,
    pub messages: Vec<Message>,
    /// (customer id, provider id)
    pub favorites: Vec<(String, String)>,
    pub earnings: Vec<Earning>,
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default()
}

fn review(id: &str, author: &str, rating: u8, comment: &str, on: NaiveDate) -> Review {
    Review {
        id: id.to_string(),
        author_name: author.to_string(),
        rating,
        comment: comment.to_string(),
        date: on,
    }
}

fn service(name: &str, price: i64, pricing_model: PricingModel) -> Service {
    Service {
        name: name.to_string(),
        starting_price: Money::from_major(price),
        pricing_model,
    }
}

fn portfolio(first_seed: u32, count: u32) -> Vec<String> {
    (first_seed..first_seed + count)
        .map(|seed| format!("https://picsum.photos/seed/{seed}/400/300"))
        .collect()
}

fn vetting(background: bool, skills: bool, references: bool, top: bool) -> VettingStatus {
    VettingStatus {
        background_checked: background,
        skills_verified: skills,
        references_checked: references,
        is_top_pro: top,
    }
}

struct ProviderSeed {
    id: &'static str,
    name: &'static str,
    email: &'static str,
    business_name: &'static str,
    description: &'static str,
    category: &'static str,
    services: Vec<Service>,
    portfolio: Vec<String>,
    reviews: Vec<Review>,
    rating: f64,
    location: (f64, f64),
    vetting: VettingStatus,
}

impl From<ProviderSeed> for Provider {
    fn from(seed: ProviderSeed) -> Self {
        Provider {
            id: seed.id.to_string(),
            name: seed.name.to_string(),
            email: seed.email.to_string(),
            business_name: seed.business_name.to_string(),
            description: seed.description.to_string(),
            category: seed.category.to_string(),
            services: seed.services,
            portfolio: seed.portfolio,
            reviews: seed.reviews,
            rating: seed.rating,
            location: GeoPoint {
                lat: seed.location.0,
                lng: seed.location.1,
            },
            vetting: seed.vetting,
        }
    }
}

fn providers() -> Vec<Provider> {
    let jane = review("r1", "Jane Doe", 5, "Excellent and timely service!", date(2024, 7, 15));
    let john = review("r2", "John Smith", 4, "Good work, but arrived a bit late.", date(2024, 7, 10));
    let emily = review(
        "r3",
        "Emily White",
        5,
        "Very professional and fixed the issue quickly.",
        date(2024, 6, 28),
    );

    let seeds = vec![
        ProviderSeed {
            id: "1",
            name: "Mike Miller",
            email: "mike@plumbing.com",
            business_name: "Pro Plumbers",
            description: "20 years of experience in residential and commercial plumbing. Fast, reliable, and affordable. Available 24/7 for emergencies.",
            category: "Plumbing",
            services: vec![
                service("Leaky Faucet Repair", 75, PricingModel::Fixed),
                service("Pipe Installation", 90, PricingModel::Hourly),
                service("Full Bathroom Plumbing", 0, PricingModel::Quote),
            ],
            portfolio: portfolio(1, 8),
            reviews: vec![jane.clone(), john.clone(), emily.clone()],
            rating: 4.8,
            location: (-26.2041, 28.0473),
            vetting: vetting(true, true, true, true),
        },
        ProviderSeed {
            id: "2",
            name: "Sarah Adams",
            email: "sarah@electrical.com",
            business_name: "Sparky Electrical",
            description: "Certified electrician specializing in home wiring, fixture installation, and safety inspections.",
            category: "Electrical",
            services: vec![
                service("Light Fixture Installation", 70, PricingModel::Fixed),
                service("Fault Finding", 85, PricingModel::Hourly),
                service("Full Home Rewiring", 0, PricingModel::Quote),
            ],
            portfolio: portfolio(11, 6),
            reviews: vec![jane.clone()],
            rating: 5.0,
            location: (-26.1952, 28.0341),
            vetting: vetting(true, true, false, false),
        },
        ProviderSeed {
            id: "3",
            name: "Chris Green",
            email: "chris@green.com",
            business_name: "Green Thumb Gardens",
            description: "Passionate about creating beautiful and sustainable garden spaces. We offer design, maintenance, and landscaping services.",
            category: "Gardening",
            services: vec![
                service("Lawn Mowing", 30, PricingModel::Fixed),
                service("Garden Design", 0, PricingModel::Quote),
            ],
            portfolio: portfolio(21, 10),
            reviews: vec![john.clone(), emily.clone()],
            rating: 4.5,
            location: (-26.1076, 28.0567),
            vetting: vetting(true, false, true, false),
        },
        ProviderSeed {
            id: "4",
            name: "Anna Cleaning Co.",
            email: "anna@clean.com",
            business_name: "Spotless Homes",
            description: "Professional and trustworthy home cleaning services. We use eco-friendly products.",
            category: "Housekeeping",
            services: vec![
                service("Standard Clean", 40, PricingModel::Hourly),
                service("Deep Clean", 100, PricingModel::Fixed),
            ],
            portfolio: portfolio(31, 4),
            reviews: vec![jane.clone()],
            rating: 4.9,
            location: (-26.2708, 28.0333),
            vetting: vetting(true, true, true, false),
        },
        ProviderSeed {
            id: "5",
            name: "Jessica Jones",
            email: "jessica@glamour.com",
            business_name: "Glamour Cuts",
            description: "Trendy haircuts, vibrant color, and professional styling. Let us bring out your best look!",
            category: "Salon & Hair",
            services: vec![
                service("Haircut & Style", 25, PricingModel::Fixed),
                service("Color & Highlights", 90, PricingModel::Fixed),
            ],
            portfolio: portfolio(41, 7),
            reviews: vec![jane.clone(), emily.clone()],
            rating: 4.7,
            location: (-26.1846, 28.0125),
            vetting: vetting(false, true, true, false),
        },
        ProviderSeed {
            id: "6",
            name: "David Chen",
            email: "david@tech.com",
            business_name: "Tech Solutions",
            description: "Your friendly neighborhood IT expert. From PC builds to network troubleshooting, we handle all your tech needs.",
            category: "I.T Services",
            services: vec![
                service("PC Repair & Diagnosis", 60, PricingModel::Hourly),
                service("Home Network Setup", 120, PricingModel::Fixed),
            ],
            portfolio: portfolio(51, 5),
            reviews: vec![john],
            rating: 4.6,
            location: (-26.1741, 28.0473),
            vetting: vetting(true, true, false, false),
        },
        ProviderSeed {
            id: "7",
            name: "Maria Garcia",
            email: "maria@gadgetfix.com",
            business_name: "Gadget Fix",
            description: "We bring your electronics back to life! Specializing in TV, audio, and mobile device repairs.",
            category: "Electronics Services",
            services: vec![
                service("TV Repair", 0, PricingModel::Quote),
                service("Phone Screen Replacement", 55, PricingModel::Fixed),
            ],
            portfolio: portfolio(61, 6),
            reviews: vec![jane, emily],
            rating: 4.8,
            location: (-26.1552, 28.0341),
            vetting: vetting(true, true, true, false),
        },
        ProviderSeed {
            id: "8",
            name: "Peter Woof",
            email: "peter@pets.com",
            business_name: "Pawsitive Care",
            description: "Experienced and loving pet care services. From daily walks to overnight sitting, your pet is in great hands.",
            category: "Pet Care",
            services: vec![
                service("Dog Walking (30 min)", 15, PricingModel::Fixed),
                service("Overnight Pet Sitting", 50, PricingModel::Fixed),
            ],
            portfolio: portfolio(71, 5),
            reviews: Vec::new(),
            rating: 5.0,
            location: (-26.16, 28.05),
            vetting: vetting(true, false, true, false),
        },
        ProviderSeed {
            id: "9",
            name: "Dr. Evelyn Reed",
            email: "evelyn@tutor.com",
            business_name: "Brainy Tutors",
            description: "PhD in Mathematics with 10+ years of tutoring experience. Helping students from high school to university level.",
            category: "Tutoring",
            services: vec![
                service("High School Math Tutoring", 40, PricingModel::Hourly),
                service("University Physics Tutoring", 60, PricingModel::Hourly),
            ],
            portfolio: portfolio(81, 5),
            reviews: Vec::new(),
            rating: 4.9,
            location: (-26.14, 28.02),
            vetting: vetting(true, true, true, true),
        },
        ProviderSeed {
            id: "10",
            name: "Alex Fitness",
            email: "alex@fit.com",
            business_name: "Body Sculpt",
            description: "Certified personal trainer dedicated to helping you reach your fitness goals. Personalized workout and nutrition plans.",
            category: "Personal Fitness",
            services: vec![
                service("One-on-One Training Session", 45, PricingModel::Hourly),
                service("Custom 1-Month Nutrition Plan", 75, PricingModel::Fixed),
            ],
            portfolio: portfolio(91, 5),
            reviews: Vec::new(),
            rating: 4.8,
            location: (-26.12, 28.08),
            vetting: vetting(true, true, false, false),
        },
    ];

    seeds.into_iter().map(Provider::from).collect()
}

fn categories() -> Vec<Category> {
    let rows: [(&str, &str, [&str; 3], &str); 12] = [
        ("cat1", "Plumbing", ["Leak Repair", "Drain Cleaning", "Toilet Installation"], "Fixing leaks, clogs, and all your pipe problems."),
        ("cat2", "Electrical", ["Wiring", "Fixture Installation", "Panel Upgrades"], "Safe and certified electrical work for your home."),
        ("cat3", "Gardening", ["Lawn Care", "Landscaping", "Tree Trimming"], "Cultivate and maintain your perfect garden."),
        ("cat4", "Housekeeping", ["Regular Cleaning", "Deep Cleaning", "Move-out Cleaning"], "Keep your home sparkling clean and tidy."),
        ("cat5", "Renovations", ["Painting", "Tiling", "Kitchen Remodeling"], "Transform your space with professional renovations."),
        ("cat6", "Babysitting", ["Evening Care", "Daytime Care", "Nanny Services"], "Trusted and caring sitters for your little ones."),
        ("cat7", "Salon & Hair", ["Haircuts", "Coloring", "Styling"], "Professional hair care, from classic cuts to modern styles."),
        ("cat8", "I.T Services", ["PC Repair", "Virus Removal", "Network Setup"], "Expert support for your computers and network infrastructure."),
        ("cat9", "Electronics Services", ["TV Repair", "Audio System Setup", "Mobile Device Repair"], "Get your gadgets and home electronics repaired by pros."),
        ("cat10", "Pet Care", ["Dog Walking", "Pet Sitting", "Grooming"], "Loving care for your furry friends when you're away."),
        ("cat11", "Tutoring", ["Math", "Science", "Languages"], "Expert academic help for all ages and subjects."),
        ("cat12", "Personal Fitness", ["Personal Training", "Yoga Instruction", "Nutrition Coaching"], "Achieve your health goals with a dedicated fitness professional."),
    ];

    rows.into_iter()
        .map(|(id, name, subcategories, description)| Category {
            id: id.to_string(),
            name: name.to_string(),
            subcategories: subcategories.iter().map(|s| s.to_string()).collect(),
            description: description.to_string(),
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn booking(
    id: &str,
    provider: (&str, &str),
    service_name: &str,
    on: NaiveDate,
    at: NaiveTime,
    status: BookingStatus,
    address: &str,
    request_type: RequestType,
    price: Option<i64>,
    reviewed: bool,
) -> Booking {
    Booking {
        id: id.to_string(),
        customer_id: "c1".to_string(),
        customer_name: "John Customer".to_string(),
        provider_id: provider.0.to_string(),
        provider_name: provider.1.to_string(),
        service_name: service_name.to_string(),
        date: on,
        time: at,
        status,
        request_type,
        price: price.map(Money::from_major),
        address: address.to_string(),
        notes: None,
        quote: None,
        reviewed,
        version: 0,
    }
}

fn bookings() -> Vec<Booking> {
    use BookingStatus::*;
    use RequestType::*;

    let mut rewiring = booking(
        "b5",
        ("2", "Sparky Electrical"),
        "Full Home Rewiring",
        date(2024, 8, 12),
        time(9, 0),
        QuoteSent,
        "111 Maple Dr, Sandton",
        HouseCall,
        Some(2500),
        false,
    );
    rewiring.quote = Some(Quote {
        items: vec![
            QuoteItem {
                description: "Labour (2 electricians, 2 days)".to_string(),
                cost: Money::from_major(1600),
            },
            QuoteItem {
                description: "Materials (cabling, fixtures, etc.)".to_string(),
                cost: Money::from_major(800),
            },
            QuoteItem {
                description: "Certificate of Compliance".to_string(),
                cost: Money::from_major(100),
            },
        ],
        total: Money::from_major(2500),
        provider_notes: Some(
            "This quote is valid for 14 days and includes all necessary materials and compliance certification."
                .to_string(),
        ),
    });

    vec![
        booking("b1", ("1", "Pro Plumbers"), "Leaky Faucet Repair", date(2024, 8, 1), time(10, 0), Confirmed, "123 Main St, Sandton", HouseCall, Some(75), false),
        booking("b2", ("3", "Green Thumb Gardens"), "Lawn Mowing", date(2024, 7, 25), time(14, 0), Completed, "456 Oak Ave, Randburg", HouseCall, Some(30), true),
        booking("b3", ("1", "Pro Plumbers"), "Full Bathroom Plumbing", date(2024, 8, 10), time(11, 0), QuoteRequested, "789 Pine Rd, Johannesburg", Emergency, None, false),
        booking("b4", ("4", "Spotless Homes"), "Deep Clean", date(2024, 7, 20), time(9, 0), Completed, "101 Pine Rd, Johannesburg", HouseCall, Some(100), false),
        rewiring,
    ]
}

fn messages(now: DateTime<Utc>) -> Vec<Message> {
    vec![
        Message {
            id: "m1".to_string(),
            booking_id: "b1".to_string(),
            sender_id: "c1".to_string(),
            sender_name: "John Customer".to_string(),
            text: "Hi, just confirming our appointment for tomorrow.".to_string(),
            timestamp: now - Duration::hours(24),
        },
        Message {
            id: "m2".to_string(),
            booking_id: "b1".to_string(),
            sender_id: "1".to_string(),
            sender_name: "Mike Miller".to_string(),
            text: "Confirmed! See you at 10:00 AM.".to_string(),
            timestamp: now - Duration::hours(23),
        },
    ]
}

fn earnings() -> Vec<Earning> {
    vec![
        Earning {
            booking_id: "b2".to_string(),
            provider_id: "3".to_string(),
            booking_date: date(2024, 7, 25),
            service_name: "Lawn Mowing".to_string(),
            amount_earned: Money::from_minor(2550),
            payout_date: date(2024, 8, 1),
            status: PayoutStatus::Paid,
        },
        Earning {
            booking_id: "b4".to_string(),
            provider_id: "4".to_string(),
            booking_date: date(2024, 7, 20),
            service_name: "Deep Clean".to_string(),
            amount_earned: Money::from_major(85),
            payout_date: date(2024, 8, 1),
            status: PayoutStatus::Paid,
        },
    ]
}

pub fn dataset(now: DateTime<Utc>) -> Dataset {
    Dataset {
        categories: categories(),
        providers: providers(),
        customers: vec![Customer {
            id: "c1".to_string(),
            name: "John Customer".to_string(),
            email: "john@customer.com".to_string(),
            location: GeoPoint {
                lat: -26.18,
                lng: 28.04,
            },
        }],
        bookings: bookings(),
        messages: messages(now),
        favorites: vec![
            ("c1".to_string(), "3".to_string()),
            ("c1".to_string(), "5".to_string()),
        ],
        earnings: earnings(),
    }
}
