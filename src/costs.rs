//! Unit transport costs between suppliers, warehouses and customers.

use derive_more::{Display, From, Into};
use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::problem::{Cost, Distance, DistanceMatrix, Id, Problem};

/// Every shipment is a round trip
pub const ROUND_TRIP: f64 = 2.0;
/// Demand is in kg while vehicle rates are per tonne
pub const KG_PER_TONNE: f64 = 1000.0;

/// Cost of moving one unit (kg) over `distance` miles and back at `rate` per mile and tonne
pub fn unit_cost(distance: Distance, rate: f64) -> Cost {
    ROUND_TRIP * distance * rate / KG_PER_TONNE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Into, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleType(u8);

impl VehicleType {
    /// 18 tonne truck
    pub const TRUCK: VehicleType = VehicleType(1);
    /// 7.5 tonne lorry
    pub const LORRY: VehicleType = VehicleType(2);
    /// 3.5 tonne van
    pub const VAN: VehicleType = VehicleType(3);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub vehicle_type: VehicleType,
    /// Payload in tonnes
    pub capacity: f64,
    pub cost_per_mile: f64,
    pub cost_per_mile_and_tonne: f64,
    /// kg CO2 emitted per mile and tonne carried
    pub co2_per_mile_and_tonne: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleTable(Vec<Vehicle>);

impl VehicleTable {
    pub fn new(vehicles: Vec<Vehicle>) -> VehicleTable {
        VehicleTable(vehicles)
    }

    pub fn get(&self, vehicle_type: VehicleType) -> Option<&Vehicle> {
        self.0.iter().find(|v| v.vehicle_type == vehicle_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vehicle> {
        self.0.iter()
    }

    pub fn types(&self) -> impl Iterator<Item = VehicleType> + '_ {
        self.0.iter().map(|v| v.vehicle_type)
    }
}

impl Default for VehicleTable {
    fn default() -> Self {
        VehicleTable(vec![
            Vehicle {
                vehicle_type: VehicleType::TRUCK,
                capacity: 9.0,
                cost_per_mile: 1.666,
                cost_per_mile_and_tonne: 0.185,
                co2_per_mile_and_tonne: 0.11,
            },
            Vehicle {
                vehicle_type: VehicleType::LORRY,
                capacity: 2.4,
                cost_per_mile: 1.727,
                cost_per_mile_and_tonne: 0.720,
                co2_per_mile_and_tonne: 0.31,
            },
            Vehicle {
                vehicle_type: VehicleType::VAN,
                capacity: 1.5,
                cost_per_mile: 1.285,
                cost_per_mile_and_tonne: 0.857,
                co2_per_mile_and_tonne: 0.30,
            },
        ])
    }
}

#[derive(Debug, Display)]
pub enum CostError {
    #[display(fmt = "no distance from {} to {}", from, to)]
    MissingDistance { from: Id, to: Id },
    #[display(fmt = "vehicle type {} is not in the vehicle table", _0)]
    UnknownVehicle(VehicleType),
}

impl std::error::Error for CostError {}

/// Unit transport cost and emission matrices for every supplier/candidate and
/// candidate/customer pair of a problem.
#[derive(Debug, Clone)]
pub struct TransportCosts {
    /// Indexed by [supplier, candidate]
    supply: Array2<Cost>,
    /// Indexed by [candidate, customer]
    delivery: Array2<Cost>,
    /// kg CO2 per unit shipped, indexed by [supplier, candidate]
    supply_emissions: Array2<f64>,
    /// kg CO2 per unit shipped, indexed by [candidate, customer]
    delivery_emissions: Array2<f64>,
}

/// Applies `rate(origin)` to the distance between every origin and destination
fn matrix(
    origins: &[Id],
    destinations: &[Id],
    distances: &DistanceMatrix,
    rate: impl Fn(usize) -> f64,
) -> Result<Array2<f64>, CostError> {
    let mut costs = Array2::zeros((origins.len(), destinations.len()));
    for (o, &from) in origins.iter().enumerate() {
        for (d, &to) in destinations.iter().enumerate() {
            let distance = distances.get(from, to).ok_or(CostError::MissingDistance { from, to })?;
            costs[[o, d]] = unit_cost(distance, rate(o));
        }
    }
    Ok(costs)
}

impl TransportCosts {
    pub fn new(problem: &Problem) -> Result<TransportCosts, CostError> {
        let vehicles = problem.vehicles();
        let supplier_vehicles = problem
            .suppliers()
            .iter()
            .map(|s| vehicles.get(s.vehicle_type()).ok_or(CostError::UnknownVehicle(s.vehicle_type())))
            .collect::<Result<Vec<_>, _>>()?;
        let van = vehicles
            .get(problem.delivery_vehicle())
            .ok_or(CostError::UnknownVehicle(problem.delivery_vehicle()))?;

        let suppliers = problem.suppliers().iter().map(|s| s.id()).collect::<Vec<_>>();
        let candidates = problem.candidates().iter().map(|c| c.id()).collect::<Vec<_>>();
        let customers = problem.customers().iter().map(|c| c.id()).collect::<Vec<_>>();
        let supplier_distances = problem.supplier_distances();
        let district_distances = problem.district_distances();

        let costs = TransportCosts {
            supply: matrix(&suppliers, &candidates, supplier_distances, |k| {
                supplier_vehicles[k].cost_per_mile_and_tonne
            })?,
            delivery: matrix(&candidates, &customers, district_distances, |_| van.cost_per_mile_and_tonne)?,
            supply_emissions: matrix(&suppliers, &candidates, supplier_distances, |k| {
                supplier_vehicles[k].co2_per_mile_and_tonne
            })?,
            delivery_emissions: matrix(&candidates, &customers, district_distances, |_| {
                van.co2_per_mile_and_tonne
            })?,
        };

        debug!(
            "Transport costs: {:?} supply pairs, {:?} delivery pairs",
            costs.supply.dim(),
            costs.delivery.dim()
        );
        Ok(costs)
    }

    /// Unit cost from supplier to candidate, indexed by [supplier, candidate]
    pub fn supply(&self) -> &Array2<Cost> {
        &self.supply
    }

    /// Unit cost from candidate to customer, indexed by [candidate, customer]
    pub fn delivery(&self) -> &Array2<Cost> {
        &self.delivery
    }

    pub fn supply_emissions(&self) -> &Array2<f64> {
        &self.supply_emissions
    }

    pub fn delivery_emissions(&self) -> &Array2<f64> {
        &self.delivery_emissions
    }
}
