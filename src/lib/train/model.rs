/*
 * Market::Trend, an LSTM market trend forecasting core
 * Copyright (C) 2025 Athaariq A. Ramadhani <foss@athaariq.my.id>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use burn::{
	config::Config,
	module::Module,
	nn::{Linear, LinearConfig, Lstm, LstmConfig, LstmState},
	tensor::{backend::Backend, Tensor},
};

/// Single-layer LSTM followed by a linear head reading the last hidden state.
#[derive(Module, Debug)]
pub struct LstmNetwork<B: Backend> {
	lstm: Lstm<B>,
	output: Linear<B>,
}

#[derive(Config, Debug)]
pub struct LstmNetworkConfig {
	/// Features per timestep, closes only
	#[config(default = 1)]
	pub input_size: usize,

	#[config(default = 64)]
	pub hidden_size: usize,
}

impl LstmNetworkConfig {
	pub fn init<B: Backend>(&self, device: &B::Device) -> LstmNetwork<B> {
		LstmNetwork {
			lstm: LstmConfig::new(self.input_size, self.hidden_size, true).init(device),
			output: LinearConfig::new(self.hidden_size, 1).init(device),
		}
	}
}

impl<B: Backend> LstmNetwork<B> {
	/// Maps `[batch, timesteps, features]` to the next scaled value of each
	/// window, shaped `[batch, 1]`.
	pub fn forward(
		&self,
		input: &Tensor<B, 3>,
		state: Option<LstmState<B, 2>>,
	) -> (Tensor<B, 2>, LstmState<B, 2>) {
		let (_, state) = self.lstm.forward(input.clone(), state);
		let output = self.output.forward(state.hidden.clone());

		(output, state)
	}
}
