use std::collections::{HashMap, HashSet};

use derive_more::Display;
use ndarray::{Array2, Array3, Array4};
use serde::{Deserialize, Serialize};

use crate::costs::{VehicleTable, VehicleType};
use crate::geo::GridRef;

/// Identifier of a supplier, or of a postcode district for candidates and customers
pub type Id = u32;
/// The type used for demand and capacity
pub type Quantity = f64;
/// The type used for distance, in miles
pub type Distance = f64;
/// The type used for cost
pub type Cost = f64;

pub type SupplierIndex = usize;
pub type CandidateIndex = usize;
pub type CustomerIndex = usize;
pub type ProductIndex = usize;
pub type PeriodIndex = usize;
pub type ScenarioIndex = usize;

/// The default number of product groups
pub const DEFAULT_PRODUCTS: usize = 4;

/// A producer holding a single product group, shipping with a single vehicle type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    id: Id,
    #[serde(flatten)]
    location: GridRef,
    /// The vehicle type used for shipments to warehouses
    vehicle_type: VehicleType,
    /// The product group supplied, numbered from 1
    product: usize,
    /// Quantity available per period
    capacity: Quantity,
}

impl Supplier {
    pub fn new(id: Id, location: GridRef, vehicle_type: VehicleType, product: usize, capacity: Quantity) -> Supplier {
        Supplier {
            id,
            location,
            vehicle_type,
            product,
            capacity,
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn location(&self) -> GridRef {
        self.location
    }

    pub fn vehicle_type(&self) -> VehicleType {
        self.vehicle_type
    }

    /// The (zero-based) product this supplier can deliver
    pub fn product(&self) -> ProductIndex {
        self.product - 1
    }

    /// Quantity available per period
    pub fn capacity(&self) -> Quantity {
        self.capacity
    }
}

/// A potential warehouse site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    id: Id,
    #[serde(flatten)]
    location: GridRef,
    /// The maximum throughput per period
    capacity: Quantity,
    /// The one-time cost of opening the warehouse
    setup_cost: Cost,
    /// The cost of keeping the warehouse open for one period
    operating_cost: Cost,
}

impl Candidate {
    pub fn new(id: Id, location: GridRef, capacity: Quantity, setup_cost: Cost, operating_cost: Cost) -> Candidate {
        Candidate {
            id,
            location,
            capacity,
            setup_cost,
            operating_cost,
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn location(&self) -> GridRef {
        self.location
    }

    pub fn capacity(&self) -> Quantity {
        self.capacity
    }

    pub fn setup_cost(&self) -> Cost {
        self.setup_cost
    }

    pub fn operating_cost(&self) -> Cost {
        self.operating_cost
    }
}

/// A demand point, i.e. a postcode district
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    id: Id,
    #[serde(flatten)]
    location: GridRef,
}

impl Customer {
    pub fn new(id: Id, location: GridRef) -> Customer {
        Customer { id, location }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn location(&self) -> GridRef {
        self.location
    }
}

/// Total demand of a customer for a product over the whole horizon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demand {
    pub customer: Id,
    pub product: usize,
    pub quantity: Quantity,
}

/// Demand of a customer for a product in a single period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodDemand {
    pub customer: Id,
    pub product: usize,
    pub period: usize,
    pub quantity: Quantity,
}

/// Demand of a customer for a product in a single period under one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDemand {
    pub customer: Id,
    pub product: usize,
    pub period: usize,
    pub scenario: usize,
    pub quantity: Quantity,
}

/// The raw distance table as it appears in an instance file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DistanceTable {
    origins: Vec<Id>,
    destinations: Vec<Id>,
    distances: Vec<Vec<Distance>>,
}

/// Distances (in miles) from a set of origins to a set of destinations, looked up by id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "DistanceTable", into = "DistanceTable")]
pub struct DistanceMatrix {
    origins: Vec<Id>,
    destinations: Vec<Id>,
    origin_index: HashMap<Id, usize>,
    destination_index: HashMap<Id, usize>,
    distances: Array2<Distance>,
}

impl DistanceMatrix {
    pub fn new(
        origins: Vec<Id>,
        destinations: Vec<Id>,
        distances: Array2<Distance>,
    ) -> Result<DistanceMatrix, ProblemConstructionError> {
        let expected = (origins.len(), destinations.len());
        if distances.dim() != expected {
            return Err(ProblemConstructionError::DistanceSizeMismatch {
                expected,
                actual: distances.dim(),
            });
        }
        if let Some(&d) = distances.iter().find(|d| !(d.is_finite() && **d >= 0.0)) {
            return Err(ProblemConstructionError::InvalidValue {
                what: "distance".to_string(),
                value: d,
            });
        }

        let origin_index = index_by_id("distance origin", &origins)?;
        let destination_index = index_by_id("distance destination", &destinations)?;
        Ok(DistanceMatrix {
            origins,
            destinations,
            origin_index,
            destination_index,
            distances,
        })
    }

    /// The distance from `from` to `to`, if both are in the matrix
    pub fn get(&self, from: Id, to: Id) -> Option<Distance> {
        let i = *self.origin_index.get(&from)?;
        let j = *self.destination_index.get(&to)?;
        Some(self.distances[[i, j]])
    }
}

impl TryFrom<DistanceTable> for DistanceMatrix {
    type Error = ProblemConstructionError;

    fn try_from(table: DistanceTable) -> Result<Self, Self::Error> {
        let expected = (table.origins.len(), table.destinations.len());
        let mut distances = Array2::zeros(expected);
        if table.distances.len() != expected.0 {
            return Err(ProblemConstructionError::DistanceSizeMismatch {
                expected,
                actual: (table.distances.len(), table.distances.first().map_or(0, |r| r.len())),
            });
        }
        for (i, row) in table.distances.iter().enumerate() {
            if row.len() != expected.1 {
                return Err(ProblemConstructionError::DistanceSizeMismatch {
                    expected,
                    actual: (table.distances.len(), row.len()),
                });
            }
            for (j, &d) in row.iter().enumerate() {
                distances[[i, j]] = d;
            }
        }
        DistanceMatrix::new(table.origins, table.destinations, distances)
    }
}

impl From<DistanceMatrix> for DistanceTable {
    fn from(matrix: DistanceMatrix) -> Self {
        DistanceTable {
            distances: matrix.distances.outer_iter().map(|row| row.to_vec()).collect(),
            origins: matrix.origins,
            destinations: matrix.destinations,
        }
    }
}

fn default_products() -> usize {
    DEFAULT_PRODUCTS
}

fn default_delivery_vehicle() -> VehicleType {
    VehicleType::VAN
}

/// A problem instance as stored on disk, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemData {
    pub suppliers: Vec<Supplier>,
    pub candidates: Vec<Candidate>,
    pub customers: Vec<Customer>,
    /// The number of product groups
    #[serde(default = "default_products")]
    pub products: usize,
    /// The number of periods, defaults to the largest period in the demand tables
    #[serde(default)]
    pub periods: Option<usize>,
    /// The number of scenarios, defaults to the largest scenario in the demand table
    #[serde(default)]
    pub scenarios: Option<usize>,
    #[serde(default)]
    pub demand: Vec<Demand>,
    #[serde(default)]
    pub period_demand: Vec<PeriodDemand>,
    #[serde(default)]
    pub scenario_demand: Vec<ScenarioDemand>,
    /// Supplier to district distances
    pub supplier_distances: DistanceMatrix,
    /// District to district distances
    pub district_distances: DistanceMatrix,
    #[serde(default)]
    pub vehicles: VehicleTable,
    /// The vehicle type used from warehouses to customers
    #[serde(default = "default_delivery_vehicle")]
    pub delivery_vehicle: VehicleType,
}

/// A validated problem instance.
#[derive(Debug, Clone)]
pub struct Problem {
    /// The suppliers, each with a single product group
    suppliers: Vec<Supplier>,
    /// The potential warehouse sites
    candidates: Vec<Candidate>,
    /// The customers (postcode districts)
    customers: Vec<Customer>,
    /// The number of different products
    products: usize,
    /// The number of periods in the planning horizon
    periods: usize,
    /// The number of demand scenarios
    scenarios: usize,
    /// Total demand, indexed by [customer, product]
    demand: Array2<Quantity>,
    /// Demand per period, indexed by [customer, product, period]
    period_demand: Array3<Quantity>,
    /// Demand per period and scenario, indexed by [customer, product, period, scenario]
    scenario_demand: Array4<Quantity>,
    supplier_distances: DistanceMatrix,
    district_distances: DistanceMatrix,
    vehicles: VehicleTable,
    delivery_vehicle: VehicleType,
    customer_index: HashMap<Id, CustomerIndex>,
}

#[derive(Debug, Display)]
pub enum ProblemConstructionError {
    /// The size of the distance matrix is not as expected
    #[display(fmt = "distance matrix should be {:?}, but is {:?}", expected, actual)]
    DistanceSizeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[display(fmt = "the instance has no suppliers")]
    NoSuppliers,
    #[display(fmt = "the instance has no candidate sites")]
    NoCandidates,
    #[display(fmt = "the instance has no customers")]
    NoCustomers,
    /// There must be at least one product
    #[display(fmt = "there must be at least one product")]
    NoProducts,
    /// The number of periods and scenarios must be strictly positive
    #[display(fmt = "there must be at least one period and one scenario")]
    NoPeriods,
    #[display(fmt = "duplicate {} id {}", kind, id)]
    DuplicateId { kind: &'static str, id: Id },
    #[display(fmt = "{} refers to product {}, expected 1..={}", what, product, products)]
    ProductOutOfRange {
        what: String,
        product: usize,
        products: usize,
    },
    #[display(fmt = "demand refers to period {}, expected 1..={}", period, periods)]
    PeriodOutOfRange { period: usize, periods: usize },
    #[display(fmt = "demand refers to scenario {}, expected 1..={}", scenario, scenarios)]
    ScenarioOutOfRange { scenario: usize, scenarios: usize },
    #[display(fmt = "demand refers to unknown customer {}", _0)]
    UnknownCustomer(Id),
    /// A quantity, capacity, cost or distance is negative or not finite
    #[display(fmt = "invalid {}: {}", what, value)]
    InvalidValue { what: String, value: f64 },
    #[display(fmt = "supplier {} uses unknown vehicle type {}", supplier, vehicle)]
    UnknownVehicle { supplier: Id, vehicle: VehicleType },
}

impl std::error::Error for ProblemConstructionError {}

fn index_by_id(kind: &'static str, ids: &[Id]) -> Result<HashMap<Id, usize>, ProblemConstructionError> {
    let mut index = HashMap::with_capacity(ids.len());
    for (i, &id) in ids.iter().enumerate() {
        if index.insert(id, i).is_some() {
            return Err(ProblemConstructionError::DuplicateId { kind, id });
        }
    }
    Ok(index)
}

fn check_value(what: impl Fn() -> String, value: f64) -> Result<(), ProblemConstructionError> {
    match value.is_finite() && value >= 0.0 {
        true => Ok(()),
        false => Err(ProblemConstructionError::InvalidValue { what: what(), value }),
    }
}

impl Problem {
    pub fn new(data: ProblemData) -> Result<Problem, ProblemConstructionError> {
        use ProblemConstructionError::*;

        if data.suppliers.is_empty() {
            return Err(NoSuppliers);
        }
        if data.candidates.is_empty() {
            return Err(NoCandidates);
        }
        if data.customers.is_empty() {
            return Err(NoCustomers);
        }
        if data.products == 0 {
            return Err(NoProducts);
        }

        let supplier_ids = data.suppliers.iter().map(|s| s.id).collect::<Vec<_>>();
        let candidate_ids = data.candidates.iter().map(|c| c.id).collect::<Vec<_>>();
        let customer_ids = data.customers.iter().map(|c| c.id).collect::<Vec<_>>();
        index_by_id("supplier", &supplier_ids)?;
        index_by_id("candidate", &candidate_ids)?;
        let customer_index = index_by_id("customer", &customer_ids)?;

        let products = data.products;
        let product_in_range = |what: &dyn Fn() -> String, product: usize| match (1..=products).contains(&product) {
            true => Ok(product - 1),
            false => Err(ProductOutOfRange {
                what: what(),
                product,
                products,
            }),
        };

        let vehicle_types = data.vehicles.types().collect::<HashSet<_>>();
        for s in &data.suppliers {
            product_in_range(&|| format!("supplier {}", s.id), s.product)?;
            check_value(|| format!("capacity of supplier {}", s.id), s.capacity)?;
            if !vehicle_types.contains(&s.vehicle_type) {
                return Err(UnknownVehicle {
                    supplier: s.id,
                    vehicle: s.vehicle_type,
                });
            }
        }
        for c in &data.candidates {
            check_value(|| format!("capacity of candidate {}", c.id), c.capacity)?;
            check_value(|| format!("setup cost of candidate {}", c.id), c.setup_cost)?;
            check_value(|| format!("operating cost of candidate {}", c.id), c.operating_cost)?;
        }
        for v in data.vehicles.iter() {
            check_value(|| format!("rate of vehicle type {}", v.vehicle_type), v.cost_per_mile_and_tonne)?;
            check_value(|| format!("emissions of vehicle type {}", v.vehicle_type), v.co2_per_mile_and_tonne)?;
        }

        let periods = data
            .periods
            .or_else(|| {
                let a = data.period_demand.iter().map(|d| d.period);
                let b = data.scenario_demand.iter().map(|d| d.period);
                a.chain(b).max()
            })
            .unwrap_or(1);
        let scenarios = data
            .scenarios
            .or_else(|| data.scenario_demand.iter().map(|d| d.scenario).max())
            .unwrap_or(1);
        if periods == 0 || scenarios == 0 {
            return Err(NoPeriods);
        }

        let customer = |id: Id| customer_index.get(&id).copied().ok_or(UnknownCustomer(id));
        let period = |t: usize| match (1..=periods).contains(&t) {
            true => Ok(t - 1),
            false => Err(PeriodOutOfRange { period: t, periods }),
        };
        let scenario = |s: usize| match (1..=scenarios).contains(&s) {
            true => Ok(s - 1),
            false => Err(ScenarioOutOfRange { scenario: s, scenarios }),
        };

        let n = data.customers.len();
        let mut demand = Array2::zeros((n, products));
        for d in &data.demand {
            check_value(|| format!("demand of customer {}", d.customer), d.quantity)?;
            let p = product_in_range(&|| format!("demand of customer {}", d.customer), d.product)?;
            demand[[customer(d.customer)?, p]] += d.quantity;
        }

        let mut period_demand = Array3::zeros((n, products, periods));
        for d in &data.period_demand {
            check_value(|| format!("demand of customer {}", d.customer), d.quantity)?;
            let p = product_in_range(&|| format!("demand of customer {}", d.customer), d.product)?;
            period_demand[[customer(d.customer)?, p, period(d.period)?]] += d.quantity;
        }

        let mut scenario_demand = Array4::zeros((n, products, periods, scenarios));
        for d in &data.scenario_demand {
            check_value(|| format!("demand of customer {}", d.customer), d.quantity)?;
            let p = product_in_range(&|| format!("demand of customer {}", d.customer), d.product)?;
            scenario_demand[[customer(d.customer)?, p, period(d.period)?, scenario(d.scenario)?]] += d.quantity;
        }

        Ok(Problem {
            suppliers: data.suppliers,
            candidates: data.candidates,
            customers: data.customers,
            products,
            periods,
            scenarios,
            demand,
            period_demand,
            scenario_demand,
            supplier_distances: data.supplier_distances,
            district_distances: data.district_distances,
            vehicles: data.vehicles,
            delivery_vehicle: data.delivery_vehicle,
            customer_index,
        })
    }

    /// The suppliers, ordered by index
    pub fn suppliers(&self) -> &[Supplier] {
        &self.suppliers
    }

    /// The candidate warehouse sites, ordered by index
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// The customers, ordered by index
    pub fn customers(&self) -> &[Customer] {
        &self.customers
    }

    /// The number of different products
    pub fn products(&self) -> usize {
        self.products
    }

    /// The number of periods in the planning horizon
    pub fn periods(&self) -> usize {
        self.periods
    }

    /// The number of demand scenarios
    pub fn scenarios(&self) -> usize {
        self.scenarios
    }

    /// Total demand, indexed by [customer, product]
    pub fn demand(&self) -> &Array2<Quantity> {
        &self.demand
    }

    /// Demand per period, indexed by [customer, product, period]
    pub fn period_demand(&self) -> &Array3<Quantity> {
        &self.period_demand
    }

    /// Demand per period and scenario, indexed by [customer, product, period, scenario]
    pub fn scenario_demand(&self) -> &Array4<Quantity> {
        &self.scenario_demand
    }

    pub fn supplier_distances(&self) -> &DistanceMatrix {
        &self.supplier_distances
    }

    pub fn district_distances(&self) -> &DistanceMatrix {
        &self.district_distances
    }

    pub fn vehicles(&self) -> &VehicleTable {
        &self.vehicles
    }

    /// The vehicle type used between warehouses and customers
    pub fn delivery_vehicle(&self) -> VehicleType {
        self.delivery_vehicle
    }

    /// The index of the customer in the same district as `id`, if any
    pub fn customer_index(&self, id: Id) -> Option<CustomerIndex> {
        self.customer_index.get(&id).copied()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::array;

    /// Three customers with 20/30/10 units of product 1 in period 1, two candidate sites
    /// with capacity 100 and one supplier with capacity 100.
    pub(crate) fn small_instance() -> ProblemData {
        let loc = |e: f64, n: f64| GridRef::new(e, n);
        ProblemData {
            suppliers: vec![Supplier::new(1, loc(400_000.0, 300_000.0), VehicleType::TRUCK, 1, 100.0)],
            candidates: vec![
                Candidate::new(10, loc(410_000.0, 300_000.0), 100.0, 1000.0, 50.0),
                Candidate::new(11, loc(450_000.0, 320_000.0), 100.0, 800.0, 40.0),
            ],
            customers: vec![
                Customer::new(10, loc(410_000.0, 300_000.0)),
                Customer::new(20, loc(415_000.0, 305_000.0)),
                Customer::new(30, loc(455_000.0, 325_000.0)),
            ],
            products: 1,
            periods: None,
            scenarios: None,
            demand: vec![
                Demand { customer: 10, product: 1, quantity: 20.0 },
                Demand { customer: 20, product: 1, quantity: 30.0 },
                Demand { customer: 30, product: 1, quantity: 10.0 },
            ],
            period_demand: vec![
                PeriodDemand { customer: 10, product: 1, period: 1, quantity: 20.0 },
                PeriodDemand { customer: 20, product: 1, period: 1, quantity: 30.0 },
                PeriodDemand { customer: 30, product: 1, period: 1, quantity: 10.0 },
            ],
            scenario_demand: vec![
                ScenarioDemand { customer: 10, product: 1, period: 1, scenario: 1, quantity: 20.0 },
                ScenarioDemand { customer: 20, product: 1, period: 1, scenario: 1, quantity: 30.0 },
                ScenarioDemand { customer: 30, product: 1, period: 1, scenario: 1, quantity: 10.0 },
            ],
            supplier_distances: DistanceMatrix::new(vec![1], vec![10, 11], array![[10.0, 40.0]]).unwrap(),
            district_distances: DistanceMatrix::new(
                vec![10, 11],
                vec![10, 20, 30],
                array![[0.0, 5.0, 35.0], [30.0, 28.0, 4.0]],
            )
            .unwrap(),
            vehicles: VehicleTable::default(),
            delivery_vehicle: VehicleType::VAN,
        }
    }

    #[test]
    fn builds_demand_tables() {
        let problem = Problem::new(small_instance()).unwrap();
        assert_eq!(problem.periods(), 1);
        assert_eq!(problem.scenarios(), 1);
        assert_eq!(problem.demand()[[1, 0]], 30.0);
        assert_eq!(problem.period_demand()[[2, 0, 0]], 10.0);
        assert_eq!(problem.scenario_demand().sum(), 60.0);
        assert_eq!(problem.customer_index(20), Some(1));
        assert_eq!(problem.suppliers()[0].product(), 0);
    }

    #[test]
    fn rejects_inconsistent_instances() {
        let mut data = small_instance();
        data.demand.push(Demand { customer: 99, product: 1, quantity: 1.0 });
        assert!(matches!(Problem::new(data), Err(ProblemConstructionError::UnknownCustomer(99))));

        let mut data = small_instance();
        data.period_demand[0].product = 2;
        assert!(matches!(
            Problem::new(data),
            Err(ProblemConstructionError::ProductOutOfRange { product: 2, .. })
        ));

        let mut data = small_instance();
        data.periods = Some(1);
        data.period_demand[0].period = 2;
        assert!(matches!(
            Problem::new(data),
            Err(ProblemConstructionError::PeriodOutOfRange { period: 2, .. })
        ));

        let mut data = small_instance();
        data.customers.push(Customer::new(10, GridRef::new(0.0, 0.0)));
        assert!(matches!(
            Problem::new(data),
            Err(ProblemConstructionError::DuplicateId { kind: "customer", id: 10 })
        ));

        let mut data = small_instance();
        data.candidates[0].capacity = -1.0;
        assert!(matches!(Problem::new(data), Err(ProblemConstructionError::InvalidValue { .. })));

        let mut data = small_instance();
        data.suppliers.clear();
        assert!(matches!(Problem::new(data), Err(ProblemConstructionError::NoSuppliers)));
    }

    #[test]
    fn reads_instance_json() {
        let json = r#"{
            "suppliers": [{"id": 1, "easting": 400000, "northing": 300000, "vehicle_type": 1, "product": 1, "capacity": 100}],
            "candidates": [{"id": 10, "easting": 410000, "northing": 300000, "capacity": 100, "setup_cost": 1000, "operating_cost": 50}],
            "customers": [{"id": 10, "easting": 410000, "northing": 300000}],
            "products": 1,
            "period_demand": [{"customer": 10, "product": 1, "period": 3, "quantity": 5}],
            "supplier_distances": {"origins": [1], "destinations": [10], "distances": [[12.5]]},
            "district_distances": {"origins": [10], "destinations": [10], "distances": [[0]]}
        }"#;
        let data: ProblemData = serde_json::from_str(json).unwrap();
        let problem = Problem::new(data).unwrap();
        assert_eq!(problem.periods(), 3);
        assert_eq!(problem.period_demand()[[0, 0, 2]], 5.0);
        assert_eq!(problem.supplier_distances().get(1, 10), Some(12.5));
        assert_eq!(problem.supplier_distances().get(1, 11), None);
        assert_eq!(problem.delivery_vehicle(), VehicleType::VAN);
    }

    #[test]
    fn rejects_ragged_distances() {
        let json = r#"{"origins": [1, 2], "destinations": [10], "distances": [[1.0], [1.0, 2.0]]}"#;
        assert!(serde_json::from_str::<DistanceMatrix>(json).is_err());
    }
}
