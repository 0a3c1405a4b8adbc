//! Contract ABI definitions.
//!
//! Minimal interfaces covering just the calls the client makes: the
//! prediction market contract and the ERC-20 wagering token.

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IMarket {
        function getMarketsCount() external view returns (uint256 count);

        function getMarketById(uint256 marketId)
            external
            view
            returns (
                address owner,
                string question,
                address collateral,
                uint256 totalYesShares,
                uint256 totalNoShares,
                uint256 totalBalance,
                uint8 result,
                bool resolved
            );

        function getUserShares(uint256 marketId, address user, bool isYes)
            external
            view
            returns (uint256 shares);

        function createMarket(string question, address collateral) external;

        function placeBet(uint256 marketId, bool isYes, uint256 amount) external;

        /// Owner-only on-chain.
        function solveMarket(uint256 marketId, uint8 result) external;

        function settle(uint256 marketId) external;
    }
}

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function allowance(address owner, address spender) external view returns (uint256 remaining);

        function balanceOf(address account) external view returns (uint256 balance);

        function approve(address spender, uint256 amount) external returns (bool success);
    }
}
